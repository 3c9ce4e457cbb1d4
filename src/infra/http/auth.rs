//! Bearer token injection and forced logout on 401.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use super::{ApiRequest, ApiResponse, Middleware, Next};
use crate::domain::{HttpError, Navigator, Route, SessionProvider};

/// Attaches credentials to outgoing requests and tears the session down when
/// the server rejects them.
pub struct AuthInjector {
    session: Arc<dyn SessionProvider>,
    navigator: Arc<dyn Navigator>,
}

impl AuthInjector {
    #[must_use]
    pub fn new(session: Arc<dyn SessionProvider>, navigator: Arc<dyn Navigator>) -> Self {
        Self { session, navigator }
    }

    fn authorize(&self, request: &mut ApiRequest) {
        let Some(token) = self.session.bearer_token() else {
            return;
        };

        match HeaderValue::from_str(&format!("Bearer {}", token.expose_secret())) {
            Ok(mut value) => {
                value.set_sensitive(true);
                request.headers.insert(AUTHORIZATION, value);
                request
                    .headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            Err(_) => warn!("Stored token is not a valid header value; sending unauthenticated"),
        }
    }
}

#[async_trait]
impl Middleware for AuthInjector {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn handle(
        &self,
        mut request: ApiRequest,
        next: Next<'_>,
    ) -> Result<ApiResponse, HttpError> {
        self.authorize(&mut request);

        let result = next.run(request).await;

        if let Err(err) = &result {
            if err.status == 401 {
                // Concurrent 401s race here; only the call that actually
                // cleared the session redirects.
                if self.session.expire() {
                    warn!(url = %err.url, "Session rejected by server, signing out");
                    self.navigator.navigate(Route::login());
                } else {
                    debug!(url = %err.url, "401 received with no active session");
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::http::RequestPipeline;
    use crate::test_utils::{MockReply, MockTransport, RecordingNavigator};
    use reqwest::Url;
    use secrecy::SecretString;
    use std::sync::Mutex;

    struct FixedSession {
        token: Mutex<Option<String>>,
    }

    impl FixedSession {
        fn with_token(token: &str) -> Self {
            Self {
                token: Mutex::new(Some(token.to_string())),
            }
        }

        fn anonymous() -> Self {
            Self {
                token: Mutex::new(None),
            }
        }
    }

    impl SessionProvider for FixedSession {
        fn bearer_token(&self) -> Option<SecretString> {
            self.token
                .lock()
                .unwrap()
                .as_deref()
                .map(|t| SecretString::from(t.to_string()))
        }

        fn expire(&self) -> bool {
            self.token.lock().unwrap().take().is_some()
        }
    }

    fn pipeline(
        session: Arc<FixedSession>,
        transport: Arc<MockTransport>,
        navigator: Arc<RecordingNavigator>,
    ) -> RequestPipeline {
        RequestPipeline::builder(Url::parse("http://bank.test/api").unwrap(), transport)
            .stage(Arc::new(AuthInjector::new(session, navigator)))
            .build()
    }

    #[tokio::test]
    async fn test_attaches_bearer_and_content_type() {
        let transport = Arc::new(MockTransport::new());
        transport.respond("GET", "/api/accounts", MockReply::json(serde_json::json!([])));
        let navigator = Arc::new(RecordingNavigator::new());
        let pipeline = pipeline(
            Arc::new(FixedSession::with_token("abc.def")),
            transport.clone(),
            navigator,
        );

        pipeline.get("/accounts").await.unwrap();

        let call = &transport.calls()[0];
        assert_eq!(call.authorization.as_deref(), Some("Bearer abc.def"));
        assert_eq!(call.content_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn test_anonymous_request_is_untouched() {
        let transport = Arc::new(MockTransport::new());
        transport.respond("POST", "/api/auth/login", MockReply::json(serde_json::json!({})));
        let navigator = Arc::new(RecordingNavigator::new());
        let pipeline = pipeline(Arc::new(FixedSession::anonymous()), transport.clone(), navigator);

        pipeline
            .post("/auth/login", &serde_json::json!({"email": "a@b.c"}))
            .await
            .unwrap();

        assert!(transport.calls()[0].authorization.is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_expires_and_redirects_once() {
        let transport = Arc::new(MockTransport::new());
        transport.respond("GET", "/api/accounts", MockReply::status(401));
        transport.respond("GET", "/api/transfers", MockReply::status(401));
        let navigator = Arc::new(RecordingNavigator::new());
        let session = Arc::new(FixedSession::with_token("stale"));
        let pipeline = pipeline(session.clone(), transport, navigator.clone());

        let (a, b) = tokio::join!(pipeline.get("/accounts"), pipeline.get("/transfers"));
        assert!(a.is_err());
        assert!(b.is_err());

        assert!(session.bearer_token().is_none());
        assert_eq!(navigator.routes(), vec![Route::login()]);
    }

    #[tokio::test]
    async fn test_other_failures_keep_session() {
        let transport = Arc::new(MockTransport::new());
        transport.respond("GET", "/api/accounts", MockReply::status(403));
        let navigator = Arc::new(RecordingNavigator::new());
        let session = Arc::new(FixedSession::with_token("valid"));
        let pipeline = pipeline(session.clone(), transport, navigator.clone());

        assert!(pipeline.get("/accounts").await.is_err());
        assert!(session.bearer_token().is_some());
        assert!(navigator.routes().is_empty());
    }
}
