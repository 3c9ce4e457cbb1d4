//! Domain traits defining contracts for external systems.

use async_trait::async_trait;
use secrecy::SecretString;

use super::error::AppError;
use super::types::{
    Account, CreateTransferRequest, LoginRequest, LoginResponse, Notification, RegisterRequest,
    Route, Severity, Transfer,
};

/// Account operations exposed by the remote API
#[async_trait]
pub trait AccountGateway: Send + Sync {
    /// List the current user's accounts
    async fn list_accounts(&self) -> Result<Vec<Account>, AppError>;

    /// List the current user's accounts, bypassing any response cache
    async fn refresh_accounts(&self) -> Result<Vec<Account>, AppError> {
        self.list_accounts().await
    }

    /// Fetch one account by number
    async fn get_account(&self, account_number: &str) -> Result<Account, AppError>;

    /// Check whether an account number exists
    async fn account_exists(&self, account_number: &str) -> Result<bool, AppError>;
}

/// Transfer operations exposed by the remote API
#[async_trait]
pub trait TransferGateway: Send + Sync {
    /// Create a transfer; the server is the authority on funds
    async fn create_transfer(&self, request: &CreateTransferRequest)
    -> Result<Transfer, AppError>;

    /// Transfer history of the current user
    async fn list_transfers(&self) -> Result<Vec<Transfer>, AppError>;

    /// Fetch one transfer by id
    async fn get_transfer(&self, id: i64) -> Result<Transfer, AppError>;
}

/// Authentication endpoints
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AppError>;

    async fn register(&self, request: &RegisterRequest) -> Result<(), AppError>;
}

/// Credentials as seen by the request pipeline
pub trait SessionProvider: Send + Sync {
    /// Current bearer token, if signed in
    fn bearer_token(&self) -> Option<SecretString>;

    /// Forced logout after the server rejected the credentials.
    /// Returns `true` only if a session was actually torn down.
    fn expire(&self) -> bool;
}

/// Durable key-value storage for session persistence
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;

    fn remove(&self, key: &str) -> Result<(), AppError>;
}

/// Sink for user-visible feedback
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);

    fn success(&self, title: &str, message: &str) {
        self.notify(Notification::new(Severity::Success, title, message));
    }

    fn error(&self, title: &str, message: &str) {
        self.notify(Notification::new(Severity::Error, title, message));
    }

    fn warning(&self, title: &str, message: &str) {
        self.notify(Notification::new(Severity::Warning, title, message));
    }

    fn info(&self, title: &str, message: &str) {
        self.notify(Notification::new(Severity::Info, title, message));
    }
}

/// Navigation requests leaving the client core
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}
