//! `reqwest`-backed transport at the end of the pipeline.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error};

use super::{ApiRequest, ApiResponse, HttpTransport};
use crate::domain::{AppError, ConfigError, HttpError};

/// Sends pipeline requests over HTTP
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: Client,
}

impl ReqwestTransport {
    /// Build a transport; `timeout` of `None` leaves requests unbounded
    pub fn new(timeout: Option<Duration>) -> Result<Self, AppError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| AppError::Config(ConfigError::HttpClient(e.to_string())))?;

        Ok(Self { http_client })
    }
}

/// Parse a response body; empty bodies become `null`, non-JSON text is kept
/// as a string.
fn parse_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// `message` field of an error body, if any
fn error_message(body: &Value) -> Option<String> {
    match body {
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, HttpError> {
        let url = request.url.to_string();
        debug!(method = %request.method, url = %url, "Sending request");

        let mut builder = self
            .http_client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            error!(error = %e, url = %url, "Request could not be delivered");
            HttpError::connectivity(url.clone(), e.to_string())
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            error!(error = %e, url = %url, "Failed to read response body");
            HttpError::connectivity(url.clone(), e.to_string())
        })?;
        let body = parse_body(&bytes);

        if !status.is_success() {
            return Err(HttpError::new(status.as_u16(), url, error_message(&body)));
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_body_variants() {
        assert_eq!(parse_body(b""), Value::Null);
        assert_eq!(parse_body(b"  \n"), Value::Null);
        assert_eq!(parse_body(br#"{"success":true}"#), json!({"success": true}));
        assert_eq!(parse_body(b"Bad Gateway"), json!("Bad Gateway"));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(&json!({"success": false, "message": "Insufficient balance"})),
            Some("Insufficient balance".to_string())
        );
        assert_eq!(error_message(&json!({"error": "x"})), None);
        assert_eq!(error_message(&json!("plain")), Some("plain".to_string()));
        assert_eq!(error_message(&Value::Null), None);
    }

    #[test]
    fn test_builds_with_and_without_timeout() {
        assert!(ReqwestTransport::new(None).is_ok());
        assert!(ReqwestTransport::new(Some(Duration::from_secs(5))).is_ok());
    }
}
