//! Domain layer containing core business types, traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{
    ApiError, AppError, ConfigError, ErrorCategory, HttpError, StorageError, ValidationError,
};
pub use traits::{
    AccountGateway, AuthGateway, KeyValueStore, Navigator, NotificationSink, SessionProvider,
    TransferGateway,
};
pub use types::{
    Account, AccountOwner, ApiEnvelope, CreateTransferRequest, DestinationValidation, FieldErrors,
    FieldIssue, LoginRequest, LoginResponse, Notification, RegisterRequest, Route, Severity,
    Transfer, TransferDraft, TransferStatus, User, UserProfile, ValidationPhase,
};
