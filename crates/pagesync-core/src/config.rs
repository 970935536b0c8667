//! Configuration module for pagesync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{ChangeDetector, Cleanup, PropertyKeys};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for pagesync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub publish: PublishConfig,
    pub rate_limiting: RateLimitingConfig,
    pub logging: LoggingConfig,
}

/// Authentication scheme for the remote API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// Username plus API token
    #[default]
    Basic,
    /// Personal access token
    Bearer,
}

/// Remote content store connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the wiki, e.g. `https://wiki.example.com`.
    pub base_url: String,
    pub auth: AuthConfig,
}

/// Credentials. `token` is usually supplied through the environment instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub scheme: AuthScheme,
    pub username: Option<String>,
    pub token: Option<String>,
}

/// What to publish and how to reconcile it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Key of the target space.
    pub space_key: String,
    /// Parent of the top-level pages. `None` means the space home page.
    pub root_parent_id: Option<String>,
    /// Version comment attached to every body update.
    pub message: Option<String>,
    /// Whether body updates notify page watchers.
    pub notify_watchers: bool,
    pub change_detector: ChangeDetector,
    /// Value of the editor-version marker property.
    pub editor_version: String,
    pub cleanup: Cleanup,
    /// Tenant tag stamped on every managed page.
    pub tenant: Option<String>,
    /// Log intended mutations instead of performing them.
    pub dry_run: bool,
    pub property_keys: PropertyKeys,
}

/// Outbound request throttling and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitingConfig {
    /// Requests per second across all calls. `None` disables the limiter.
    pub requests_per_second: Option<f64>,
    /// Retries after a 429/503 response before giving up.
    pub max_retries: u32,
    /// First backoff delay in milliseconds; doubles on every retry.
    pub backoff_base_ms: u64,
    /// Upper bound for a single backoff delay in milliseconds.
    pub backoff_max_ms: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/pagesync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("pagesync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            space_key: String::new(),
            root_parent_id: None,
            message: None,
            notify_watchers: false,
            change_detector: ChangeDetector::Hash,
            editor_version: "v2".to_string(),
            cleanup: Cleanup::None,
            tenant: None,
            dry_run: false,
            property_keys: PropertyKeys::default(),
        }
    }
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            requests_per_second: None,
            max_retries: 5,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"publish.space_key"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- remote ---
        let base_url = self.remote.base_url.trim();
        if base_url.is_empty() {
            errors.push(ValidationError {
                field: "remote.base_url".into(),
                message: "must not be empty".into(),
            });
        } else if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            errors.push(ValidationError {
                field: "remote.base_url".into(),
                message: format!("must start with http:// or https://, got '{base_url}'"),
            });
        }
        match self.remote.auth.scheme {
            AuthScheme::Basic => {
                if self.remote.auth.username.as_deref().map_or(true, str::is_empty) {
                    errors.push(ValidationError {
                        field: "remote.auth.username".into(),
                        message: "required for basic authentication".into(),
                    });
                }
            }
            AuthScheme::Bearer => {
                if self.remote.auth.token.as_deref().map_or(true, str::is_empty) {
                    errors.push(ValidationError {
                        field: "remote.auth.token".into(),
                        message: "required for bearer authentication".into(),
                    });
                }
            }
        }

        // --- publish ---
        if self.publish.space_key.trim().is_empty() {
            errors.push(ValidationError {
                field: "publish.space_key".into(),
                message: "must not be empty".into(),
            });
        }
        if self.publish.editor_version.trim().is_empty() {
            errors.push(ValidationError {
                field: "publish.editor_version".into(),
                message: "must not be empty".into(),
            });
        }
        if self.publish.tenant.as_deref() == Some("") {
            errors.push(ValidationError {
                field: "publish.tenant".into(),
                message: "must not be empty when set".into(),
            });
        }

        // --- rate_limiting ---
        if let Some(rps) = self.rate_limiting.requests_per_second {
            if !(rps > 0.0 && rps.is_finite()) {
                errors.push(ValidationError {
                    field: "rate_limiting.requests_per_second".into(),
                    message: format!("must be a positive number, got {rps}"),
                });
            }
        }
        if self.rate_limiting.backoff_base_ms == 0 {
            errors.push(ValidationError {
                field: "rate_limiting.backoff_base_ms".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.rate_limiting.backoff_max_ms < self.rate_limiting.backoff_base_ms {
            errors.push(ValidationError {
                field: "rate_limiting.backoff_max_ms".into(),
                message: format!(
                    "backoff_max_ms ({}) must not be below backoff_base_ms ({})",
                    self.rate_limiting.backoff_max_ms, self.rate_limiting.backoff_base_ms
                ),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use pagesync_core::config::ConfigBuilder;
/// use pagesync_core::domain::Cleanup;
///
/// let config = ConfigBuilder::new()
///     .base_url("https://wiki.example.com")
///     .username("ci-bot")
///     .space_key("DOCS")
///     .cleanup(Cleanup::Managed)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- remote ---

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.base_url = url.into();
        self
    }

    pub fn auth_scheme(mut self, scheme: AuthScheme) -> Self {
        self.config.remote.auth.scheme = scheme;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.remote.auth.username = Some(username.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.remote.auth.token = Some(token.into());
        self
    }

    // --- publish ---

    pub fn space_key(mut self, key: impl Into<String>) -> Self {
        self.config.publish.space_key = key.into();
        self
    }

    pub fn root_parent_id(mut self, id: impl Into<String>) -> Self {
        self.config.publish.root_parent_id = Some(id.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.config.publish.message = Some(message.into());
        self
    }

    pub fn notify_watchers(mut self, notify: bool) -> Self {
        self.config.publish.notify_watchers = notify;
        self
    }

    pub fn change_detector(mut self, detector: ChangeDetector) -> Self {
        self.config.publish.change_detector = detector;
        self
    }

    pub fn editor_version(mut self, version: impl Into<String>) -> Self {
        self.config.publish.editor_version = version.into();
        self
    }

    pub fn cleanup(mut self, cleanup: Cleanup) -> Self {
        self.config.publish.cleanup = cleanup;
        self
    }

    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.config.publish.tenant = Some(tenant.into());
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.publish.dry_run = dry_run;
        self
    }

    // --- rate_limiting ---

    pub fn requests_per_second(mut self, rps: f64) -> Self {
        self.config.rate_limiting.requests_per_second = Some(rps);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.rate_limiting.max_retries = n;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
