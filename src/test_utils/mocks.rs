//! Mock implementations for testing.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderName};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::{
    Account, AccountGateway, AccountOwner, AppError, AuthGateway, CreateTransferRequest,
    HttpError, LoginRequest, LoginResponse, Navigator, Notification, NotificationSink,
    RegisterRequest, Route, Transfer, TransferGateway, TransferStatus, User,
};
use crate::infra::http::{ApiRequest, ApiResponse, HttpTransport};

/// Configuration for mock behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub should_fail: bool,
    pub error: Option<AppError>,
}

impl MockConfig {
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failure(error: AppError) -> Self {
        Self {
            should_fail: true,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::failure(AppError::Rejected(message.into()))
    }

    fn check(&self) -> Result<(), AppError> {
        if self.should_fail {
            return Err(self
                .error
                .clone()
                .unwrap_or_else(|| AppError::Rejected("Mock error".to_string())));
        }
        Ok(())
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

#[must_use]
pub fn sample_user() -> User {
    User {
        id: 7,
        email: "ada@example.com".to_string(),
        username: "ada".to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        phone_number: "0600000000".to_string(),
        created_at: None,
        country: Some("FR".to_string()),
        profile_photo: None,
    }
}

#[must_use]
pub fn sample_account(account_number: &str, balance: i64) -> Account {
    Account {
        id: account_number.bytes().map(i64::from).sum(),
        account_number: account_number.to_string(),
        balance: Decimal::from(balance),
        currency: "EUR".to_string(),
        created_at: None,
        user: Some(AccountOwner {
            id: 7,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        }),
    }
}

#[must_use]
pub fn sample_transfer(id: i64, request: &CreateTransferRequest) -> Transfer {
    Transfer {
        id,
        from_account: sample_account(&request.from_account_number, 0),
        to_account: sample_account(&request.to_account_number, 0),
        amount: request.amount,
        description: request.description.clone(),
        status: TransferStatus::Completed,
        created_at: None,
    }
}

/// Unsigned JWT whose payload carries the given `exp`
#[must_use]
pub fn jwt_with_exp(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"ada@example.com","exp":{exp}}}"#));
    format!("{header}.{payload}.signature")
}

// ============================================================================
// TRANSPORT
// ============================================================================

/// Scripted answer of [`MockTransport`]
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub body: serde_json::Value,
    pub delay: Duration,
}

impl MockReply {
    #[must_use]
    pub fn json(body: serde_json::Value) -> Self {
        Self {
            status: 200,
            body,
            delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: serde_json::Value::Null,
            delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: serde_json::json!({"success": false, "message": message}),
            delay: Duration::ZERO,
        }
    }

    /// No response at all
    #[must_use]
    pub fn unreachable() -> Self {
        Self::status(0)
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A request seen by [`MockTransport`]
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub url: String,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Option<serde_json::Value>,
    pub at: Instant,
}

/// Transport answering from a script keyed by method and path.
///
/// The last reply of a sequence repeats; unscripted routes answer 404.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<HashMap<(String, String), VecDeque<MockReply>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: &str, path: &str, reply: MockReply) {
        self.respond_sequence(method, path, vec![reply]);
    }

    pub fn respond_sequence(&self, method: &str, path: &str, replies: Vec<MockReply>) {
        self.replies
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), replies.into());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next_reply(&self, method: &str, path: &str) -> Option<MockReply> {
        let mut replies = self.replies.lock().unwrap();
        let queue = replies.get_mut(&(method.to_string(), path.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, HttpError> {
        let header = |name: HeaderName| {
            request
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let method = request.method.as_str().to_string();
        let path = request.path().to_string();
        let url = request.url.to_string();

        self.calls.lock().unwrap().push(RecordedCall {
            method: method.clone(),
            url: url.clone(),
            path: path.clone(),
            authorization: header(AUTHORIZATION),
            content_type: header(CONTENT_TYPE),
            body: request.body.clone(),
            at: Instant::now(),
        });

        let Some(reply) = self.next_reply(&method, &path) else {
            return Err(HttpError::new(404, url, None));
        };
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }

        match reply.status {
            0 => Err(HttpError::connectivity(url, "connection refused")),
            200..=299 => Ok(ApiResponse {
                status: reply.status,
                body: reply.body,
            }),
            status => {
                let message = reply
                    .body
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string);
                Err(HttpError::new(status, url, message))
            }
        }
    }
}

// ============================================================================
// GATEWAYS
// ============================================================================

#[derive(Debug, Clone)]
struct LookupScript {
    result: Result<bool, AppError>,
    delay: Duration,
}

/// Mock account gateway with scripted existence lookups
pub struct MockAccountGateway {
    accounts: Vec<Account>,
    lookups: HashMap<String, LookupScript>,
    lookup_log: Mutex<Vec<String>>,
    config: MockConfig,
}

impl MockAccountGateway {
    #[must_use]
    pub fn new(accounts: Vec<Account>) -> Self {
        Self::with_config(accounts, MockConfig::success())
    }

    #[must_use]
    pub fn with_config(accounts: Vec<Account>, config: MockConfig) -> Self {
        Self {
            accounts,
            lookups: HashMap::new(),
            lookup_log: Mutex::new(Vec::new()),
            config,
        }
    }

    #[must_use]
    pub fn with_lookup(self, account_number: &str, exists: bool) -> Self {
        self.with_delayed_lookup(account_number, exists, Duration::ZERO)
    }

    #[must_use]
    pub fn with_delayed_lookup(
        mut self,
        account_number: &str,
        exists: bool,
        delay: Duration,
    ) -> Self {
        self.lookups.insert(
            account_number.to_string(),
            LookupScript {
                result: Ok(exists),
                delay,
            },
        );
        self
    }

    #[must_use]
    pub fn with_failing_lookup(mut self, account_number: &str) -> Self {
        self.lookups.insert(
            account_number.to_string(),
            LookupScript {
                result: Err(AppError::Rejected("Lookup failed".to_string())),
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// Account numbers looked up so far, in call order
    pub fn lookups(&self) -> Vec<String> {
        self.lookup_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccountGateway for MockAccountGateway {
    async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        self.config.check()?;
        Ok(self.accounts.clone())
    }

    async fn get_account(&self, account_number: &str) -> Result<Account, AppError> {
        self.config.check()?;
        self.accounts
            .iter()
            .find(|a| a.account_number == account_number)
            .cloned()
            .ok_or_else(|| AppError::Rejected("Account not found".to_string()))
    }

    async fn account_exists(&self, account_number: &str) -> Result<bool, AppError> {
        self.lookup_log
            .lock()
            .unwrap()
            .push(account_number.to_string());

        let Some(script) = self.lookups.get(account_number).cloned() else {
            return Ok(false);
        };
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        script.result
    }
}

/// Mock transfer gateway recording every create call
pub struct MockTransferGateway {
    requests: Mutex<Vec<CreateTransferRequest>>,
    created: Mutex<Vec<Transfer>>,
    next_id: AtomicI64,
    delay: Duration,
    config: MockConfig,
}

impl MockTransferGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            delay: Duration::ZERO,
            config,
        }
    }

    #[must_use]
    pub fn failing(error: AppError) -> Self {
        Self::with_config(MockConfig::failure(error))
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<CreateTransferRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for MockTransferGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransferGateway for MockTransferGateway {
    async fn create_transfer(&self, request: &CreateTransferRequest) -> Result<Transfer, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.config.check()?;

        let transfer = sample_transfer(self.next_id.fetch_add(1, Ordering::Relaxed), request);
        self.created.lock().unwrap().push(transfer.clone());
        Ok(transfer)
    }

    async fn list_transfers(&self) -> Result<Vec<Transfer>, AppError> {
        self.config.check()?;
        Ok(self.created.lock().unwrap().clone())
    }

    async fn get_transfer(&self, id: i64) -> Result<Transfer, AppError> {
        self.config.check()?;
        self.created
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| AppError::Rejected("Transfer not found".to_string()))
    }
}

/// Mock auth gateway issuing a fixed token
pub struct MockAuthGateway {
    token: String,
    user: User,
    login_emails: Mutex<Vec<String>>,
    config: MockConfig,
}

impl MockAuthGateway {
    #[must_use]
    pub fn new(token: impl Into<String>, user: User) -> Self {
        Self {
            token: token.into(),
            user,
            login_emails: Mutex::new(Vec::new()),
            config: MockConfig::success(),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            config: MockConfig::rejected(message),
            ..Self::new("", sample_user())
        }
    }

    pub fn login_emails(&self) -> Vec<String> {
        self.login_emails.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthGateway for MockAuthGateway {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AppError> {
        self.login_emails.lock().unwrap().push(request.email.clone());
        self.config.check()?;
        Ok(LoginResponse {
            token: self.token.clone(),
            user: self.user.clone(),
        })
    }

    async fn register(&self, _request: &RegisterRequest) -> Result<(), AppError> {
        self.config.check()
    }
}

// ============================================================================
// SINKS
// ============================================================================

/// Notification sink that keeps everything it receives
#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

/// Navigator that records requested routes
#[derive(Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.routes.lock().unwrap().push(route);
    }
}

