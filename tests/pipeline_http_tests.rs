//! End-to-end tests of the request pipeline over real HTTP.
//!
//! Uses `wiremock` to stand in for the money-transfer API and drives the
//! gateways of a fully assembled [`ClientContext`].

use std::sync::Arc;
use std::time::Duration;

use money_transfer_client::app::ClientConfig;
use money_transfer_client::app::ClientContext;
use money_transfer_client::app::session::{TOKEN_KEY, USER_KEY};
use money_transfer_client::domain::{
    AppError, CreateTransferRequest, ErrorCategory, KeyValueStore, Route, Severity,
};
use money_transfer_client::infra::{MemoryKeyValueStore, ReqwestTransport};
use money_transfer_client::test_utils::{
    RecordingNavigator, RecordingNotifier, sample_account, sample_transfer, sample_user,
};
use rust_decimal::Decimal;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// HARNESS
// ============================================================================

struct Harness {
    ctx: ClientContext,
    storage: Arc<MemoryKeyValueStore>,
    notifier: Arc<RecordingNotifier>,
    navigator: Arc<RecordingNavigator>,
}

fn config_for(base_url: String) -> ClientConfig {
    ClientConfig {
        api_base_url: base_url,
        retry_base_delay: Duration::from_millis(10),
        http_timeout: Some(Duration::from_secs(5)),
        ..ClientConfig::default()
    }
}

fn build(config: ClientConfig, signed_in_as: Option<&str>) -> Harness {
    let storage = Arc::new(MemoryKeyValueStore::new());
    if let Some(token) = signed_in_as {
        storage.set(TOKEN_KEY, token).unwrap();
        storage
            .set(USER_KEY, &serde_json::to_string(&sample_user()).unwrap())
            .unwrap();
    }
    let notifier = Arc::new(RecordingNotifier::new());
    let navigator = Arc::new(RecordingNavigator::new());
    let transport = Arc::new(ReqwestTransport::new(config.http_timeout).unwrap());

    let ctx = ClientContext::new(
        config,
        transport,
        storage.clone(),
        notifier.clone(),
        navigator.clone(),
    )
    .unwrap();

    Harness {
        ctx,
        storage,
        notifier,
        navigator,
    }
}

async fn harness(server: &MockServer, signed_in_as: Option<&str>) -> Harness {
    build(config_for(format!("{}/api", server.uri())), signed_in_as)
}

fn ok(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "message": "",
        "data": data
    }))
}

// ============================================================================
// AUTH INJECTION
// ============================================================================

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_bearer_token_attached_when_signed_in() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/accounts"))
            .and(header("Authorization", "Bearer tok-123"))
            .and(header("Content-Type", "application/json"))
            .respond_with(ok(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, Some("tok-123")).await;
        let accounts = h.ctx.accounts.list_accounts().await.unwrap();
        assert!(accounts.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_clears_session_and_redirects_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/accounts"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/transfers"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let h = harness(&server, Some("stale")).await;
        assert!(h.ctx.session.is_authenticated());

        let (accounts, transfers) = tokio::join!(
            h.ctx.accounts.list_accounts(),
            h.ctx.transfers.list_transfers()
        );

        for result in [accounts.map(|_| ()), transfers.map(|_| ())] {
            let err = result.unwrap_err();
            assert_eq!(err.category(), Some(ErrorCategory::Unauthenticated));
        }
        assert!(!h.ctx.session.is_authenticated());
        assert_eq!(h.storage.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(h.navigator.routes(), vec![Route::login()]);
        assert!(h.notifier.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_login_persists_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({"email": "ada@example.com", "password": "hunter22"})))
            .respond_with(ok(json!({"token": "fresh-token", "user": sample_user()})))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, None).await;
        let user = h
            .ctx
            .auth
            .login("  ada@example.com ", "hunter22")
            .await
            .unwrap();

        assert_eq!(user, sample_user());
        assert!(h.ctx.session.is_authenticated());
        assert_eq!(
            h.storage.get(TOKEN_KEY).unwrap().as_deref(),
            Some("fresh-token")
        );
    }

    #[tokio::test]
    async fn test_failed_login_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, None).await;
        let err = h
            .ctx
            .auth
            .login("ada@example.com", "hunter22")
            .await
            .unwrap_err();

        assert_eq!(err.category(), Some(ErrorCategory::ServerError));
        assert!(!h.ctx.session.is_authenticated());
    }
}

// ============================================================================
// CACHE
// ============================================================================

mod cache_tests {
    use super::*;

    #[tokio::test]
    async fn test_repeated_account_listing_served_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/accounts"))
            .respond_with(ok(json!([sample_account("FR7600000001", 100)])))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, Some("tok")).await;
        let first = h.ctx.accounts.list_accounts().await.unwrap();
        let second = h.ctx.accounts.list_accounts().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.ctx.cache.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_bypasses_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/accounts"))
            .respond_with(ok(json!([sample_account("FR7600000001", 100)])))
            .expect(2)
            .mount(&server)
            .await;

        let h = harness(&server, Some("tok")).await;
        h.ctx.accounts.list_accounts().await.unwrap();
        h.ctx.accounts.list_accounts().await.unwrap();
        h.ctx.accounts.refresh_accounts().await.unwrap();
    }

    #[tokio::test]
    async fn test_transfer_history_never_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/transfers"))
            .respond_with(ok(json!([])))
            .expect(2)
            .mount(&server)
            .await;

        let h = harness(&server, Some("tok")).await;
        h.ctx.transfers.list_transfers().await.unwrap();
        h.ctx.transfers.list_transfers().await.unwrap();
        assert!(h.ctx.cache.is_empty());
    }

    #[tokio::test]
    async fn test_account_search_cached_per_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/accounts/search"))
            .and(query_param("accountNumber", "FR7600000002"))
            .respond_with(ok(json!(true)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/accounts/search"))
            .and(query_param("accountNumber", "FR7600000003"))
            .respond_with(ok(json!(false)))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, Some("tok")).await;
        assert!(h.ctx.accounts.account_exists("FR7600000002").await.unwrap());
        assert!(h.ctx.accounts.account_exists("FR7600000002").await.unwrap());
        assert!(!h.ctx.accounts.account_exists("FR7600000003").await.unwrap());
    }
}

// ============================================================================
// RETRY AND CLASSIFICATION
// ============================================================================

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_server_error_retried_twice_then_reported_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/accounts"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let h = harness(&server, Some("tok")).await;
        let err = h.ctx.accounts.list_accounts().await.unwrap_err();

        assert_eq!(err.category(), Some(ErrorCategory::ServerError));
        assert_eq!(err.user_message(), "Server error. Please try again later.");

        let notes = h.notifier.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].severity, Severity::Error);
        assert_eq!(notes[0].title, "Error");
    }

    #[tokio::test]
    async fn test_transient_failure_recovers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/transfers"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/transfers"))
            .respond_with(ok(json!([])))
            .mount(&server)
            .await;

        let h = harness(&server, Some("tok")).await;
        let transfers = h.ctx.transfers.list_transfers().await.unwrap();

        assert!(transfers.is_empty());
        assert!(h.notifier.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/transfers/42"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, Some("tok")).await;
        let err = h.ctx.transfers.get_transfer(42).await.unwrap_err();

        assert_eq!(err.category(), Some(ErrorCategory::NotFound));
        assert_eq!(h.notifier.notifications()[0].message, "Resource not found");
    }

    #[tokio::test]
    async fn test_bad_request_surfaces_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/transfers"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "success": false,
                "message": "Insufficient balance"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, Some("tok")).await;
        let request = CreateTransferRequest {
            from_account_number: "FR7600000001".to_string(),
            to_account_number: "FR7600000002".to_string(),
            amount: Decimal::new(5000, 2),
            description: None,
        };
        let err = h.ctx.transfers.create_transfer(&request).await.unwrap_err();

        assert!(err.is_surfaced());
        assert_eq!(err.user_message(), "Insufficient balance");
    }

    #[tokio::test]
    async fn test_rejected_envelope_is_not_an_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/accounts/FR7600009999"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "message": ""
            })))
            .mount(&server)
            .await;

        let h = harness(&server, Some("tok")).await;
        let err = h.ctx.accounts.get_account("FR7600009999").await.unwrap_err();

        assert_eq!(err, AppError::Rejected("Account not found".to_string()));
        assert!(!err.is_surfaced());
        assert!(h.notifier.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_created_transfer_decoded() {
        let server = MockServer::start().await;
        let request = CreateTransferRequest {
            from_account_number: "FR7600000001".to_string(),
            to_account_number: "FR7600000002".to_string(),
            amount: Decimal::new(2550, 2),
            description: Some("Rent".to_string()),
        };
        Mock::given(method("POST"))
            .and(path("/api/transfers"))
            .respond_with(ok(json!(sample_transfer(9, &request))))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, Some("tok")).await;
        let transfer = h.ctx.transfers.create_transfer(&request).await.unwrap();

        assert_eq!(transfer.id, 9);
        assert_eq!(transfer.amount, Decimal::new(2550, 2));
    }

    #[tokio::test]
    async fn test_unreachable_server_reported_as_connectivity() {
        let h = build(config_for("http://127.0.0.1:9/api".to_string()), Some("tok"));
        let err = h.ctx.accounts.list_accounts().await.unwrap_err();

        assert_eq!(err.category(), Some(ErrorCategory::Connectivity));
        assert_eq!(
            h.notifier.notifications()[0].message,
            "Unable to reach the server. Check your internet connection."
        );
    }
}
