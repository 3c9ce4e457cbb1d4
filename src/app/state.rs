//! Composition root wiring the client core together.

use std::sync::Arc;

use crate::domain::{
    AccountGateway, AppError, AuthGateway, KeyValueStore, Navigator, NotificationSink,
    TransferGateway,
};
use crate::infra::http::{
    AuthInjector, CacheLayer, ErrorClassifier, HttpTransport, RequestPipeline, ResponseCache,
    RetryPolicy,
};
use crate::infra::{HttpAccountGateway, HttpAuthGateway, HttpTransferGateway};

use super::auth::{AuthGuard, AuthService};
use super::config::ClientConfig;
use super::orchestrator::TransferOrchestrator;
use super::session::SessionStore;

/// Shared services of one client instance
#[derive(Clone)]
pub struct ClientContext {
    pub config: ClientConfig,
    pub session: Arc<SessionStore>,
    pub cache: Arc<ResponseCache>,
    pub pipeline: Arc<RequestPipeline>,
    pub accounts: Arc<dyn AccountGateway>,
    pub transfers: Arc<dyn TransferGateway>,
    pub auth: Arc<AuthService>,
    pub notifier: Arc<dyn NotificationSink>,
    pub navigator: Arc<dyn Navigator>,
}

impl ClientContext {
    /// Restore the persisted session and build the pipeline
    /// (auth → cache → retry → transport) plus the gateways on top of it.
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
        storage: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn NotificationSink>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, AppError> {
        let session = Arc::new(SessionStore::restore(storage)?);
        let cache = Arc::new(ResponseCache::new(config.cache_ttl));

        let pipeline = Arc::new(
            RequestPipeline::builder(config.base_url()?, transport)
                .stage(Arc::new(AuthInjector::new(
                    session.clone(),
                    Arc::clone(&navigator),
                )))
                .stage(Arc::new(CacheLayer::new(Arc::clone(&cache))))
                .stage(Arc::new(RetryPolicy::new(
                    config.max_retries,
                    config.retry_base_delay,
                )))
                .classifier(ErrorClassifier::new(Arc::clone(&notifier)))
                .build(),
        );

        let accounts: Arc<dyn AccountGateway> =
            Arc::new(HttpAccountGateway::new(Arc::clone(&pipeline)));
        let transfers: Arc<dyn TransferGateway> =
            Arc::new(HttpTransferGateway::new(Arc::clone(&pipeline)));
        let auth_gateway: Arc<dyn AuthGateway> =
            Arc::new(HttpAuthGateway::new(Arc::clone(&pipeline)));
        let auth = Arc::new(AuthService::new(
            auth_gateway,
            Arc::clone(&session),
            Arc::clone(&navigator),
        ));

        Ok(Self {
            config,
            session,
            cache,
            pipeline,
            accounts,
            transfers,
            auth,
            notifier,
            navigator,
        })
    }

    #[must_use]
    pub fn auth_guard(&self) -> AuthGuard {
        AuthGuard::new(
            Arc::clone(&self.session),
            Arc::clone(&self.navigator),
            Arc::clone(&self.notifier),
        )
    }

    /// A fresh transfer form
    #[must_use]
    pub fn transfer_orchestrator(&self) -> TransferOrchestrator {
        TransferOrchestrator::new(
            Arc::clone(&self.accounts),
            Arc::clone(&self.transfers),
            Arc::clone(&self.notifier),
            Arc::clone(&self.navigator),
            self.config.destination_debounce,
            self.config.redirect_delay,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::MemoryKeyValueStore;
    use crate::test_utils::{
        MockReply, MockTransport, RecordingNavigator, RecordingNotifier, sample_user,
    };

    fn context(transport: Arc<MockTransport>, storage: Arc<MemoryKeyValueStore>) -> ClientContext {
        ClientContext::new(
            ClientConfig {
                api_base_url: "http://bank.test/api".to_string(),
                ..ClientConfig::default()
            },
            transport,
            storage,
            Arc::new(RecordingNotifier::new()),
            Arc::new(RecordingNavigator::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_pipeline_stage_order() {
        let ctx = context(
            Arc::new(MockTransport::new()),
            Arc::new(MemoryKeyValueStore::new()),
        );
        assert_eq!(ctx.pipeline.stage_names(), vec!["auth", "cache", "retry"]);
    }

    #[test]
    fn test_restores_persisted_session() {
        let storage = Arc::new(MemoryKeyValueStore::new());
        SessionStore::new(storage.clone())
            .login_succeeded("tok", sample_user())
            .unwrap();

        let ctx = context(Arc::new(MockTransport::new()), storage);
        assert!(ctx.session.is_authenticated());
    }

    #[tokio::test]
    async fn test_gateways_share_cache() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            "GET",
            "/api/accounts",
            MockReply::json(serde_json::json!({"success": true, "data": []})),
        );
        let ctx = context(transport.clone(), Arc::new(MemoryKeyValueStore::new()));

        ctx.accounts.list_accounts().await.unwrap();
        ctx.accounts.list_accounts().await.unwrap();

        assert_eq!(transport.call_count(), 1);
        assert_eq!(ctx.cache.len(), 1);
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let result = ClientContext::new(
            ClientConfig {
                api_base_url: "::".to_string(),
                ..ClientConfig::default()
            },
            Arc::new(MockTransport::new()),
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(RecordingNotifier::new()),
            Arc::new(RecordingNavigator::new()),
        );
        assert!(result.is_err());
    }
}
