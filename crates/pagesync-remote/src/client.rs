//! REST API client
//!
//! Provides an authenticated HTTP client for the wiki REST API. Every
//! request goes through [`RestClient::execute`], which applies the shared
//! rate limiter, retries throttled responses and turns error statuses into
//! [`RemoteError::Api`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pagesync_remote::client::{Credentials, RestClient};
//! use reqwest::Method;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = RestClient::new(
//!     "https://wiki.example.com",
//!     Credentials::bearer("personal-access-token"),
//! )?;
//! let url = client.url("/rest/api/space/DOCS")?;
//! let space: serde_json::Value = client.get_json(url).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::rate_limit::{rate_limit_headers, RateLimiter, RetryPolicy};
use crate::RemoteError;

/// Credentials attached to every request
#[derive(Clone)]
pub enum Credentials {
    /// HTTP basic authentication with a username and API token
    Basic { username: String, token: String },
    /// Bearer (personal access) token
    Bearer(String),
    /// No authentication header
    Anonymous,
}

impl Credentials {
    pub fn basic(username: impl Into<String>, token: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            token: token.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Credentials::Bearer(token.into())
    }

    fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            Credentials::Basic { username, token } => builder.basic_auth(username, Some(token)),
            Credentials::Bearer(token) => builder.bearer_auth(token),
            Credentials::Anonymous => builder,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("token", &"***")
                .finish(),
            Credentials::Bearer(_) => f.debug_tuple("Bearer").field(&"***").finish(),
            Credentials::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// HTTP client for the REST API
///
/// Wraps `reqwest::Client` with authentication, base URL construction,
/// an optional shared [`RateLimiter`] and the [`RetryPolicy`] for
/// throttled requests.
#[derive(Debug)]
pub struct RestClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL without trailing slash, may include a context path
    base_url: String,
    credentials: Credentials,
    /// Optional rate limiter shared by every call of this client
    rate_limiter: Option<Arc<RateLimiter>>,
    retry_policy: RetryPolicy,
}

impl RestClient {
    /// Creates a new client for the API at `base_url`
    ///
    /// # Errors
    /// Returns [`RemoteError::Url`] if `base_url` is not an absolute URL.
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Result<Self, RemoteError> {
        let base_url = base_url.into();
        Url::parse(&base_url)?;
        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            rate_limiter: None,
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Sets the rate limiter for this client.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Sets the retry policy for throttled requests.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.rate_limiter.as_ref()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds an absolute URL for an API path (e.g. `/rest/api/content`)
    pub fn url(&self, path: &str) -> Result<Url, RemoteError> {
        Ok(Url::parse(&format!("{}{}", self.base_url, path))?)
    }

    /// Creates an authenticated request builder
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.credentials
            .apply(self.client.request(method, url))
            .header("Accept", "application/json")
    }

    /// Executes a request with rate limiting and throttling retries.
    ///
    /// `customize` is called once per attempt to add a body, query or
    /// headers to a fresh builder, since request bodies cannot be replayed.
    ///
    /// 1. **Rate limiting**: waits for a limiter token before every attempt
    /// 2. **Throttling**: on 429/503, sleeps per the retry policy and retries
    /// 3. **Errors**: other non-success statuses become [`RemoteError::Api`]
    ///
    /// # Returns
    /// The successful response, or an error once retries are exhausted.
    pub async fn execute<F>(
        &self,
        method: Method,
        url: Url,
        customize: F,
    ) -> Result<Response, RemoteError>
    where
        F: Fn(RequestBuilder) -> Result<RequestBuilder, RemoteError>,
    {
        let max_retries = self.retry_policy.max_retries;

        for attempt in 0..=max_retries {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.acquire().await;
            }

            let builder = customize(self.request(method.clone(), url.clone()))?;
            let response = builder.send().await?;
            let status = response.status();

            let headers = rate_limit_headers(response.headers());
            if !headers.is_empty() {
                debug!(%url, status = status.as_u16(), ?headers, "Rate limit headers");
            }

            if RetryPolicy::is_retryable(status) {
                if attempt >= max_retries {
                    warn!(%url, attempts = attempt + 1, "Throttling retry limit exhausted");
                    return Err(RemoteError::RetriesExhausted {
                        attempts: attempt + 1,
                        status,
                    });
                }

                let delay = self.retry_policy.delay_for(attempt);
                info!(
                    %url,
                    status = status.as_u16(),
                    attempt,
                    delay_ms = delay.as_millis(),
                    "Request throttled, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                debug!(%url, status = status.as_u16(), "Request failed");
                return Err(RemoteError::Api { status, body });
            }

            if attempt > 0 {
                info!(%url, attempt, "Request succeeded after retry");
            }
            return Ok(response);
        }

        Err(RemoteError::InvalidResponse(format!(
            "retry loop exited unexpectedly for {url}"
        )))
    }

    /// `GET` a URL and parse the JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, RemoteError> {
        let response = self.execute(Method::GET, url, Ok).await?;
        parse_json(response).await
    }

    /// Send a JSON body and parse the JSON response
    pub async fn send_json<B, T>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<T, RemoteError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.execute(method, url, |b| Ok(b.json(body))).await?;
        parse_json(response).await
    }

    /// Send a request and discard the response body
    pub async fn send_empty(&self, method: Method, url: Url) -> Result<(), RemoteError> {
        self.execute(method, url, Ok).await?;
        Ok(())
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
}
