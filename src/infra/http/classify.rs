//! Maps terminal HTTP failures to user-facing categories and messages.

use std::sync::Arc;

use tracing::{error, warn};

use crate::domain::{ApiError, ErrorCategory, HttpError, NotificationSink};

const NOTIFICATION_TITLE: &str = "Error";

/// Classifies a terminal failure and reports it to the user at most once.
///
/// 401 is never reported here: the auth stage handles it by logging out.
#[derive(Clone)]
pub struct ErrorClassifier {
    notifier: Option<Arc<dyn NotificationSink>>,
}

impl ErrorClassifier {
    #[must_use]
    pub fn new(notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            notifier: Some(notifier),
        }
    }

    /// Classifier that categorizes without notifying anyone
    #[must_use]
    pub fn silent() -> Self {
        Self { notifier: None }
    }

    /// Pure mapping from a raw failure to its classified form
    #[must_use]
    pub fn classify(error: &HttpError) -> ApiError {
        let category = ErrorCategory::from_status(error.status);
        let server_message = error.message.as_deref().filter(|m| !m.trim().is_empty());
        let message = match error.status {
            0 => "Unable to reach the server. Check your internet connection.",
            400 => server_message.unwrap_or("Invalid data"),
            401 => "Session expired. Please sign in again.",
            403 => "Access denied. You do not have the required permissions.",
            404 => "Resource not found",
            422 => "Validation data is incorrect",
            500 => "Server error. Please try again later.",
            503 => "Service temporarily unavailable",
            _ => server_message.unwrap_or("An unexpected error occurred"),
        };

        ApiError {
            status: error.status,
            category,
            message: message.to_string(),
            url: error.url.clone(),
        }
    }

    /// Classify, log, and notify. Returns the classified error.
    pub fn report(&self, error: &HttpError) -> ApiError {
        let classified = Self::classify(error);

        if classified.category == ErrorCategory::Unauthenticated {
            warn!(url = %classified.url, "Request rejected as unauthenticated");
            return classified;
        }

        error!(
            status = classified.status,
            category = %classified.category,
            url = %classified.url,
            detail = ?error.message,
            "HTTP request failed"
        );

        if let Some(notifier) = &self.notifier {
            notifier.error(NOTIFICATION_TITLE, &classified.message);
        }

        classified
    }
}
