//! Shared test helpers for REST API integration tests
//!
//! Each helper returns a client pointing at a wiremock server. Retry
//! delays are shortened so throttling tests run quickly.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::MockServer;

use pagesync_remote::rate_limit::RetryPolicy;
use pagesync_remote::{Credentials, RestClient, RestContentClient};

/// Retry policy with millisecond delays
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

/// Starts a mock server and returns a content client pointing at it
pub async fn setup() -> (MockServer, RestContentClient) {
    let server = MockServer::start().await;
    let rest = RestClient::new(server.uri(), Credentials::basic("bot", "api-token"))
        .expect("mock server uri is a valid base url")
        .with_retry_policy(fast_retry(3));
    (server, RestContentClient::new(rest))
}

/// A page content object the way the API returns it
pub fn content_json(id: &str, title: &str) -> Value {
    json!({ "id": id, "type": "page", "title": title })
}

/// `count` child pages with ids `first..first + count`
pub fn child_pages(first: usize, count: usize) -> Vec<Value> {
    (first..first + count)
        .map(|i| content_json(&i.to_string(), &format!("Child {i}")))
        .collect()
}
