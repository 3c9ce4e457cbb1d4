//! Linear-backoff retry for transient server failures.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ApiRequest, ApiResponse, Middleware, Next};
use crate::domain::HttpError;

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Retries a request after `base_delay × attempt` when the server fails
/// with a 5xx status.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Reads, plus anything touching accounts or transfers
    #[must_use]
    pub fn applies_to(request: &ApiRequest) -> bool {
        let path = request.path();
        request.is_get() || path.contains("/accounts") || path.contains("/transfers")
    }

    /// Delay before retry number `attempt` (1-based)
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    fn should_retry(&self, error: &HttpError, retries_made: u32) -> bool {
        retries_made < self.max_retries && error.is_server_error()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_BASE_DELAY)
    }
}

#[async_trait]
impl Middleware for RetryPolicy {
    fn name(&self) -> &'static str {
        "retry"
    }

    async fn handle(&self, request: ApiRequest, next: Next<'_>) -> Result<ApiResponse, HttpError> {
        if !Self::applies_to(&request) {
            return next.run(request).await;
        }

        let mut retries_made = 0;
        loop {
            match next.run(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if self.should_retry(&err, retries_made) => {
                    retries_made += 1;
                    let delay = self.delay_for(retries_made);
                    debug!(
                        url = %err.url,
                        status = err.status,
                        attempt = retries_made,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if retries_made > 0 {
                        warn!(url = %err.url, status = err.status, retries = retries_made, "Giving up after retries");
                    }
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::http::RequestPipeline;
    use crate::test_utils::{MockReply, MockTransport};
    use reqwest::Url;
    use serde_json::json;
    use std::sync::Arc;

    fn pipeline(transport: Arc<MockTransport>) -> RequestPipeline {
        RequestPipeline::builder(Url::parse("http://bank.test/api").unwrap(), transport)
            .stage(Arc::new(RetryPolicy::default()))
            .build()
    }

    #[test]
    fn test_delays_grow_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
    }

    #[test]
    fn test_applicability() {
        use reqwest::Method;
        let url = |p: &str| Url::parse(&format!("http://bank.test/api{p}")).unwrap();

        assert!(RetryPolicy::applies_to(&ApiRequest::get(url("/anything"))));
        assert!(RetryPolicy::applies_to(&ApiRequest::post(url("/transfers"), json!({}))));
        assert!(RetryPolicy::applies_to(&ApiRequest::new(Method::PUT, url("/accounts/1"))));
        assert!(!RetryPolicy::applies_to(&ApiRequest::post(url("/auth/login"), json!({}))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_retry_twice_with_backoff() {
        let transport = Arc::new(MockTransport::new());
        transport.respond("GET", "/api/accounts", MockReply::status(500));
        let pipeline = pipeline(transport.clone());

        let started = tokio::time::Instant::now();
        let result = pipeline.get("/accounts").await;
        assert!(result.is_err());

        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].at - calls[0].at, Duration::from_millis(1000));
        assert_eq!(calls[2].at - calls[1].at, Duration::from_millis(2000));
        assert_eq!(started.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_when_server_comes_back() {
        let transport = Arc::new(MockTransport::new());
        transport.respond_sequence(
            "GET",
            "/api/accounts",
            vec![MockReply::status(503), MockReply::json(json!([]))],
        );
        let pipeline = pipeline(transport.clone());

        let response = pipeline.get("/accounts").await.unwrap();
        assert_eq!(response.body, json!([]));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_not_retried() {
        let transport = Arc::new(MockTransport::new());
        transport.respond("GET", "/api/accounts", MockReply::status(404));
        transport.respond("GET", "/api/transfers", MockReply::status(400));
        let pipeline = pipeline(transport.clone());

        assert!(pipeline.get("/accounts").await.is_err());
        assert!(pipeline.get("/transfers").await.is_err());
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connectivity_failures_are_not_retried() {
        let transport = Arc::new(MockTransport::new());
        transport.respond("GET", "/api/accounts", MockReply::unreachable());
        let pipeline = pipeline(transport.clone());

        assert!(pipeline.get("/accounts").await.is_err());
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_whitelisted_post_is_not_retried() {
        let transport = Arc::new(MockTransport::new());
        transport.respond("POST", "/api/auth/login", MockReply::status(500));
        let pipeline = pipeline(transport.clone());

        assert!(pipeline.post("/auth/login", &json!({})).await.is_err());
        assert_eq!(transport.call_count(), 1);
    }
}
