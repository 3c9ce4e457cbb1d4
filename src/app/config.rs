//! Client configuration loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::domain::{AppError, ConfigError};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_SESSION_FILE: &str = ".money-transfer-session.json";

/// Runtime settings of the client core
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root of the REST API, e.g. `http://localhost:8080/api`
    pub api_base_url: String,
    /// Lifetime of cached GET responses
    pub cache_ttl: Duration,
    /// Extra attempts after a 5xx failure
    pub max_retries: u32,
    /// Retry `n` waits `retry_base_delay × n`
    pub retry_base_delay: Duration,
    /// Quiet period before a destination lookup fires
    pub destination_debounce: Duration,
    /// Delay before leaving the transfer screen after success
    pub redirect_delay: Duration,
    /// Per-request timeout; `None` disables it
    pub http_timeout: Option<Duration>,
    /// Where the CLI persists the session
    pub session_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            cache_ttl: Duration::from_secs(300),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(1000),
            destination_debounce: Duration::from_millis(800),
            redirect_delay: Duration::from_millis(3000),
            http_timeout: None,
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
        }
    }
}

impl ClientConfig {
    /// Load from environment variables, falling back to defaults
    #[must_use]
    pub fn from_env() -> Self {
        use std::env;

        let defaults = Self::default();

        let api_base_url = env::var("API_BASE_URL").unwrap_or(defaults.api_base_url);

        let cache_ttl = env::var("CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache_ttl);

        let max_retries = env::var("MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_retries);

        let retry_base_delay = env::var("RETRY_BASE_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_base_delay);

        let destination_debounce = env::var("DESTINATION_DEBOUNCE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.destination_debounce);

        let redirect_delay = env::var("REDIRECT_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.redirect_delay);

        let http_timeout = env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs);

        let session_file = env::var("SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.session_file);

        Self {
            api_base_url,
            cache_ttl,
            max_retries,
            retry_base_delay,
            destination_debounce,
            redirect_delay,
            http_timeout,
            session_file,
        }
    }

    /// Parsed API base URL
    pub fn base_url(&self) -> Result<Url, AppError> {
        Url::parse(&self.api_base_url).map_err(|e| {
            AppError::Config(ConfigError::InvalidValue {
                key: "API_BASE_URL".to_string(),
                message: e.to_string(),
            })
        })
    }
}
