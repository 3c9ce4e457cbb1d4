//! Error taxonomy for the client core.
//!
//! Raw HTTP failures ([`HttpError`]) travel through the request pipeline
//! unclassified. They are mapped exactly once, at the pipeline boundary, into
//! an [`ApiError`] carrying an [`ErrorCategory`] and a user-facing message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// User-facing failure categories, keyed by HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Status 0: the server could not be reached at all
    Connectivity,
    /// 400 or 422
    Validation,
    /// 401, handled by forced logout
    Unauthenticated,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 500 or 503
    ServerError,
    /// Any other status
    Unclassified,
}

impl ErrorCategory {
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            0 => Self::Connectivity,
            400 | 422 => Self::Validation,
            401 => Self::Unauthenticated,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500 | 503 => Self::ServerError,
            _ => Self::Unclassified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connectivity => "connectivity",
            Self::Validation => "validation",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::ServerError => "server_error",
            Self::Unclassified => "unclassified",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unclassified failure as seen by pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HTTP {status} from {url}")]
pub struct HttpError {
    /// HTTP status, or 0 when no response was received
    pub status: u16,
    pub url: String,
    /// `message` field of the error body, when the server sent one
    pub message: Option<String>,
}

impl HttpError {
    #[must_use]
    pub fn new(status: u16, url: impl Into<String>, message: Option<String>) -> Self {
        Self {
            status,
            url: url.into(),
            message,
        }
    }

    /// Failure where no HTTP response was received.
    #[must_use]
    pub fn connectivity(url: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(0, url, Some(detail.into()))
    }

    /// Server-class failures are the only transient ones.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// Terminal HTTP failure after classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: u16,
    pub category: ErrorCategory,
    /// Human-readable message already shown (or deliberately suppressed)
    pub message: String,
    pub url: String,
}

/// Input validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Validation failed: {0}")]
    Multiple(String),
}

/// Persisted key-value storage errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Storage serialization error: {0}")]
    Serialization(String),
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Top-level error type of the crate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The API answered with `success: false`
    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Not authenticated")]
    NotAuthenticated,
}

impl AppError {
    /// Message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.message.clone(),
            Self::Rejected(message) => message.clone(),
            Self::Validation(ValidationError::InvalidField { message, .. }) => message.clone(),
            Self::NotAuthenticated => "Please sign in to continue".to_string(),
            _ => "An unexpected error occurred".to_string(),
        }
    }

    /// True when the request pipeline already reported this failure to the user.
    #[must_use]
    pub fn is_surfaced(&self) -> bool {
        matches!(self, Self::Api(_))
    }

    #[must_use]
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Api(e) => Some(e.category),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_status() {
        let cases = [
            (0, ErrorCategory::Connectivity),
            (400, ErrorCategory::Validation),
            (401, ErrorCategory::Unauthenticated),
            (403, ErrorCategory::Forbidden),
            (404, ErrorCategory::NotFound),
            (422, ErrorCategory::Validation),
            (500, ErrorCategory::ServerError),
            (503, ErrorCategory::ServerError),
            (502, ErrorCategory::Unclassified),
            (418, ErrorCategory::Unclassified),
        ];
        for (status, category) in cases {
            assert_eq!(ErrorCategory::from_status(status), category, "status {status}");
        }
    }

    #[test]
    fn test_http_error_server_class() {
        assert!(HttpError::new(500, "u", None).is_server_error());
        assert!(HttpError::new(502, "u", None).is_server_error());
        assert!(!HttpError::new(499, "u", None).is_server_error());
        assert!(!HttpError::connectivity("u", "refused").is_server_error());
    }

    #[test]
    fn test_only_api_errors_are_surfaced() {
        let api = AppError::Api(ApiError {
            status: 500,
            category: ErrorCategory::ServerError,
            message: "Server error".to_string(),
            url: "http://x/accounts".to_string(),
        });
        assert!(api.is_surfaced());
        assert_eq!(api.user_message(), "Server error");
        assert_eq!(api.category(), Some(ErrorCategory::ServerError));

        let rejected = AppError::Rejected("Insufficient funds".to_string());
        assert!(!rejected.is_surfaced());
        assert_eq!(rejected.user_message(), "Insufficient funds");
        assert!(rejected.category().is_none());
    }
}
