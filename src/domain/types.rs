//! Domain types with validation support.

use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError as Violation, ValidationErrors};

use super::error::AppError;

/// Shortest accepted account number
pub const ACCOUNT_NUMBER_MIN_LENGTH: usize = 10;
/// Longest accepted account number
pub const ACCOUNT_NUMBER_MAX_LENGTH: usize = 20;
/// Maximum transfer description length, in characters
pub const DESCRIPTION_MAX_LENGTH: usize = 200;
/// Smallest amount that may be transferred (0.01)
pub const MIN_TRANSFER_AMOUNT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
/// Largest amount that may be transferred
pub const MAX_TRANSFER_AMOUNT: Decimal = Decimal::from_parts(999_999, 0, 0, false, 0);

// ============================================================================
// API RECORDS
// ============================================================================

/// Authenticated user identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub profile_photo: Option<String>,
}

/// Display-oriented view of the current user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub full_name: String,
    pub initials: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        let initials: String = user
            .first_name
            .chars()
            .take(1)
            .chain(user.last_name.chars().take(1))
            .collect::<String>()
            .to_uppercase();
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            phone_number: user.phone_number.clone(),
            full_name: format!("{} {}", user.first_name, user.last_name),
            initials,
        }
    }
}

/// Owner summary embedded in account records
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountOwner {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

/// Bank account as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub account_number: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub currency: String,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub user: Option<AccountOwner>,
}

/// Lifecycle status of a transfer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for TransferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid transfer status: {}", s)),
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Executed (or pending) transfer as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: i64,
    pub from_account: Account,
    pub to_account: Account,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TransferStatus,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

/// Body of `POST /transfers`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferRequest {
    pub from_account_number: String,
    pub to_account_number: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of `POST /auth/login`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Body of `POST /auth/register`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 6, max = 20, message = "Password must be 6 to 20 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "Phone number is required"))]
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Payload of a successful login
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Envelope wrapping every API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Unwrap an envelope whose payload is mandatory.
    pub fn into_data(self, fallback: &str) -> Result<T, AppError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(AppError::Rejected(non_empty_or(self.message, fallback))),
        }
    }

    /// Unwrap an envelope whose payload may be absent.
    pub fn into_optional(self, fallback: &str) -> Result<Option<T>, AppError> {
        if self.success {
            Ok(self.data)
        } else {
            Err(AppError::Rejected(non_empty_or(self.message, fallback)))
        }
    }
}

fn non_empty_or(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

// ============================================================================
// TRANSFER DRAFT
// ============================================================================

/// In-progress transfer form, exactly as typed.
///
/// Only the account-independent rules live in the derive; balance and
/// ownership checks need the loaded accounts and are applied by the
/// orchestrator on top of [`TransferDraft::field_errors`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Validate)]
pub struct TransferDraft {
    #[validate(length(min = 1, code = "required"))]
    pub from_account_number: String,
    #[validate(custom(function = "validate_account_number"))]
    pub to_account_number: String,
    #[validate(custom(function = "validate_amount"))]
    pub amount: String,
    #[validate(length(max = 200, code = "too_long"))]
    pub description: String,
}

impl TransferDraft {
    /// Destination as it will be sent: trimmed and uppercased.
    #[must_use]
    pub fn normalized_destination(&self) -> String {
        normalize_account_number(&self.to_account_number)
    }

    #[must_use]
    pub fn parsed_amount(&self) -> Option<Decimal> {
        parse_amount(&self.amount)
    }

    /// Account-independent field errors.
    #[must_use]
    pub fn field_errors(&self) -> FieldErrors {
        match self.validate() {
            Ok(()) => FieldErrors::default(),
            Err(errors) => FieldErrors::from_violations(&errors),
        }
    }

    pub fn to_request(&self) -> Result<CreateTransferRequest, AppError> {
        let amount = self.parsed_amount().ok_or_else(|| {
            AppError::Validation(super::error::ValidationError::InvalidField {
                field: "amount".to_string(),
                message: FieldIssue::NotNumeric.to_string(),
            })
        })?;
        let description = self.description.trim();
        Ok(CreateTransferRequest {
            from_account_number: self.from_account_number.trim().to_string(),
            to_account_number: self.normalized_destination(),
            amount,
            description: (!description.is_empty()).then(|| description.to_string()),
        })
    }
}

#[must_use]
pub fn normalize_account_number(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// `^[A-Z0-9]{10,20}$` on an already-normalized value
#[must_use]
pub fn is_account_number(value: &str) -> bool {
    (ACCOUNT_NUMBER_MIN_LENGTH..=ACCOUNT_NUMBER_MAX_LENGTH).contains(&value.len())
        && value
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

#[must_use]
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim()).ok()
}

fn validate_account_number(value: &str) -> Result<(), Violation> {
    let normalized = normalize_account_number(value);
    if normalized.is_empty() {
        return Err(Violation::new("required"));
    }
    if normalized.chars().count() < ACCOUNT_NUMBER_MIN_LENGTH {
        return Err(Violation::new("too_short"));
    }
    if !is_account_number(&normalized) {
        return Err(Violation::new("invalid_account_number"));
    }
    Ok(())
}

fn validate_amount(value: &str) -> Result<(), Violation> {
    if value.trim().is_empty() {
        return Err(Violation::new("required"));
    }
    let amount = parse_amount(value).ok_or_else(|| Violation::new("not_numeric"))?;
    if amount < MIN_TRANSFER_AMOUNT {
        return Err(Violation::new("below_minimum"));
    }
    if amount > MAX_TRANSFER_AMOUNT {
        return Err(Violation::new("above_maximum"));
    }
    Ok(())
}

/// Why a single form field is invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldIssue {
    Required,
    TooShort,
    TooLong,
    InvalidAccountNumber,
    NotNumeric,
    BelowMinimum,
    AboveMaximum,
    InsufficientFunds,
    UnknownAccount,
    Invalid,
}

impl FieldIssue {
    fn from_code(code: &str) -> Self {
        match code {
            "required" => Self::Required,
            "too_short" => Self::TooShort,
            "too_long" => Self::TooLong,
            "invalid_account_number" => Self::InvalidAccountNumber,
            "not_numeric" => Self::NotNumeric,
            "below_minimum" => Self::BelowMinimum,
            "above_maximum" => Self::AboveMaximum,
            _ => Self::Invalid,
        }
    }
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required => write!(f, "This field is required"),
            Self::TooShort => write!(f, "Minimum {} characters", ACCOUNT_NUMBER_MIN_LENGTH),
            Self::TooLong => write!(f, "Maximum {} characters", DESCRIPTION_MAX_LENGTH),
            Self::InvalidAccountNumber => write!(f, "Invalid account number format"),
            Self::NotNumeric => write!(f, "Amount must be a number"),
            Self::BelowMinimum => write!(f, "Minimum amount: {}", MIN_TRANSFER_AMOUNT),
            Self::AboveMaximum => write!(f, "Maximum amount: {}", MAX_TRANSFER_AMOUNT),
            Self::InsufficientFunds => write!(f, "Insufficient balance"),
            Self::UnknownAccount => write!(f, "Select one of your accounts"),
            Self::Invalid => write!(f, "Invalid field"),
        }
    }
}

/// Per-field structural validation result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldErrors {
    pub source: Option<FieldIssue>,
    pub destination: Option<FieldIssue>,
    pub amount: Option<FieldIssue>,
    pub description: Option<FieldIssue>,
}

impl FieldErrors {
    fn from_violations(errors: &ValidationErrors) -> Self {
        let mut out = Self::default();
        for (field, violations) in errors.field_errors() {
            let Some(first) = violations.first() else {
                continue;
            };
            let issue = FieldIssue::from_code(&first.code);
            match field.as_ref() {
                "from_account_number" => out.source = Some(issue),
                "to_account_number" => out.destination = Some(issue),
                "amount" => out.amount = Some(issue),
                "description" => out.description = Some(issue),
                _ => {}
            }
        }
        out
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_none()
            && self.destination.is_none()
            && self.amount.is_none()
            && self.description.is_none()
    }

    /// `(field, issue)` pairs in form order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, FieldIssue)> + '_ {
        [
            ("source", self.source),
            ("destination", self.destination),
            ("amount", self.amount),
            ("description", self.description),
        ]
        .into_iter()
        .filter_map(|(field, issue)| issue.map(|issue| (field, issue)))
    }
}

// ============================================================================
// DESTINATION VALIDATION
// ============================================================================

/// Phase of the asynchronous destination check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationPhase {
    #[default]
    Idle,
    Debouncing,
    Validating,
    Valid,
    Invalid,
    /// The lookup itself failed; says nothing about the account
    Error,
}

/// Visible state of the destination account check
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DestinationValidation {
    pub phase: ValidationPhase,
    pub account_number: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl DestinationValidation {
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn debouncing(account_number: &str) -> Self {
        Self {
            phase: ValidationPhase::Debouncing,
            account_number: Some(account_number.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn validating(account_number: &str) -> Self {
        Self {
            phase: ValidationPhase::Validating,
            account_number: Some(account_number.to_string()),
            message: Some("Checking account...".to_string()),
            error: None,
        }
    }

    #[must_use]
    pub fn valid(account_number: &str) -> Self {
        Self {
            phase: ValidationPhase::Valid,
            account_number: Some(account_number.to_string()),
            message: Some("Destination account is valid".to_string()),
            error: None,
        }
    }

    #[must_use]
    pub fn not_found(account_number: &str) -> Self {
        Self::invalid(account_number, "Destination account not found")
    }

    #[must_use]
    pub fn own_account(account_number: &str) -> Self {
        Self::invalid(account_number, "Cannot transfer to your own account")
    }

    #[must_use]
    pub fn lookup_failed(account_number: &str) -> Self {
        Self {
            phase: ValidationPhase::Error,
            account_number: Some(account_number.to_string()),
            message: None,
            error: Some("Account validation failed".to_string()),
        }
    }

    fn invalid(account_number: &str, reason: &str) -> Self {
        Self {
            phase: ValidationPhase::Invalid,
            account_number: Some(account_number.to_string()),
            message: None,
            error: Some(reason.to_string()),
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.phase == ValidationPhase::Valid
    }

    #[must_use]
    pub fn is_validating(&self) -> bool {
        self.phase == ValidationPhase::Validating
    }

    /// No timer pending and no lookup outstanding
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(
            self.phase,
            ValidationPhase::Debouncing | ValidationPhase::Validating
        )
    }
}

// ============================================================================
// COLLABORATOR MESSAGES
// ============================================================================

/// Severity of a user-visible notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Warning,
    Info,
}

/// User-visible feedback message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl Notification {
    #[must_use]
    pub fn new(severity: Severity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
        }
    }
}

/// Navigation targets the client core can request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login { return_url: Option<String> },
    Dashboard,
    Accounts,
    Transfer,
    History,
}

impl Route {
    #[must_use]
    pub fn login() -> Self {
        Self::Login { return_url: None }
    }

    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Login {
                return_url: Some(url),
            } => format!("/login?returnUrl={}", url),
            Self::Login { return_url: None } => "/login".to_string(),
            Self::Dashboard => "/dashboard".to_string(),
            Self::Accounts => "/accounts".to_string(),
            Self::Transfer => "/transfer".to_string(),
            Self::History => "/history".to_string(),
        }
    }
}
