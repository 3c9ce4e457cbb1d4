//! Transfer form workflow: validation, confirmation, and single-flight
//! submission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use super::steps::{Touched, TransferStep, derive_steps};
use super::validator::DestinationValidator;
use crate::domain::types::{MIN_TRANSFER_AMOUNT, normalize_account_number};
use crate::domain::{
    Account, AccountGateway, AppError, CreateTransferRequest, DestinationValidation, FieldErrors,
    FieldIssue, Navigator, NotificationSink, Route, Transfer, TransferDraft, TransferGateway,
};

/// Result of pressing the submit button
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The form is not ready; every field is now marked touched
    Incomplete {
        errors: FieldErrors,
        destination: DestinationValidation,
    },
    /// First press: the summary is shown, nothing was sent
    AwaitingConfirmation,
    /// Another submission is in flight
    AlreadySubmitting,
    /// This form already produced a transfer
    AlreadyCompleted,
    /// Re-validation before sending failed
    FinalValidationFailed(Vec<String>),
    Completed(Transfer),
    /// The transfer was refused or could not be sent; the draft is kept
    Failed(AppError),
}

/// What the confirmation screen shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    pub from_account: String,
    pub to_account: String,
    pub amount: Decimal,
    pub description: String,
    pub fees: Decimal,
    pub total_amount: Decimal,
}

/// Clears the in-flight flag when dropped
struct SubmitGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SubmitGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct FormState {
    draft: TransferDraft,
    touched: Touched,
    /// Accounts with a positive balance
    sources: Vec<Account>,
    confirming: bool,
    completed: Option<Transfer>,
    last_error: Option<String>,
}

impl FormState {
    fn source_account(&self) -> Option<&Account> {
        let number = self.draft.from_account_number.trim();
        self.sources.iter().find(|a| a.account_number == number)
    }

    fn field_errors(&self) -> FieldErrors {
        let mut errors = self.draft.field_errors();
        let source = self.source_account();

        if errors.source.is_none() && source.is_none() {
            errors.source = Some(FieldIssue::UnknownAccount);
        }
        if errors.amount.is_none() {
            let amount = self.draft.parsed_amount();
            if let (Some(amount), Some(source)) = (amount, source) {
                if amount > source.balance {
                    errors.amount = Some(FieldIssue::InsufficientFunds);
                }
            }
        }
        errors
    }
}

/// Checks repeated right before sending. Balance is only what the client
/// last saw; the server makes the final call on funds.
#[must_use]
pub fn final_validation(
    request: &CreateTransferRequest,
    source_balance: Option<Decimal>,
) -> Vec<String> {
    let mut problems = Vec::new();
    if normalize_account_number(&request.from_account_number) == request.to_account_number {
        problems.push("Source and destination accounts must be different".to_string());
    }
    if let Some(balance) = source_balance {
        if balance < request.amount {
            problems.push("Insufficient balance in the source account".to_string());
        }
    }
    if request.amount < MIN_TRANSFER_AMOUNT {
        problems.push(format!("The minimum amount is {MIN_TRANSFER_AMOUNT}"));
    }
    problems
}

/// Drives one transfer form from first keystroke to completed transfer
pub struct TransferOrchestrator {
    accounts: Arc<dyn AccountGateway>,
    transfers: Arc<dyn TransferGateway>,
    notifier: Arc<dyn NotificationSink>,
    navigator: Arc<dyn Navigator>,
    validator: DestinationValidator,
    redirect_delay: Duration,
    submitting: AtomicBool,
    form: Mutex<FormState>,
}

impl TransferOrchestrator {
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountGateway>,
        transfers: Arc<dyn TransferGateway>,
        notifier: Arc<dyn NotificationSink>,
        navigator: Arc<dyn Navigator>,
        debounce: Duration,
        redirect_delay: Duration,
    ) -> Self {
        let validator = DestinationValidator::new(Arc::clone(&accounts), debounce);
        Self {
            accounts,
            transfers,
            notifier,
            navigator,
            validator,
            redirect_delay,
            submitting: AtomicBool::new(false),
            form: Mutex::new(FormState::default()),
        }
    }

    fn form(&self) -> MutexGuard<'_, FormState> {
        self.form.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a draft edit; any edit leaves the confirmation screen
    fn edit(&self, apply: impl FnOnce(&mut FormState)) {
        let mut form = self.form();
        apply(&mut form);
        form.confirming = false;
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Fetch the user's accounts fresh from the server
    #[instrument(skip(self))]
    pub async fn load_accounts(&self) -> Result<Vec<Account>, AppError> {
        let accounts = match self.accounts.refresh_accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                error!(error = %e, "Failed to load accounts");
                if !e.is_surfaced() {
                    self.notifier
                        .error("Loading failed", "Unable to load your accounts");
                }
                return Err(e);
            }
        };

        self.validator
            .set_own_accounts(accounts.iter().map(|a| a.account_number.as_str()));

        let sources: Vec<Account> = accounts
            .into_iter()
            .filter(|a| a.balance > Decimal::ZERO)
            .collect();
        info!(sources = sources.len(), "Source accounts loaded");

        if sources.is_empty() {
            warn!("No account with a positive balance");
            self.notifier.warning(
                "No account available",
                "You have no account with a sufficient balance to make a transfer",
            );
            self.navigator.navigate(Route::Accounts);
        }

        self.form().sources = sources.clone();
        Ok(sources)
    }

    /// Accounts that can fund a transfer
    #[must_use]
    pub fn source_accounts(&self) -> Vec<Account> {
        self.form().sources.clone()
    }

    #[must_use]
    pub fn selected_source(&self) -> Option<Account> {
        self.form().source_account().cloned()
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Apply deep-link parameters; a non-numeric amount is ignored
    pub fn prefill(&self, from: Option<&str>, to: Option<&str>, amount: Option<&str>) {
        let amount = amount.filter(|a| crate::domain::types::parse_amount(a).is_some());
        self.edit(|form| {
            if let Some(from) = from {
                form.draft.from_account_number = from.to_string();
            }
            if let Some(to) = to {
                form.draft.to_account_number = to.to_string();
            }
            if let Some(amount) = amount {
                form.draft.amount = amount.trim().to_string();
            }
        });
        if let Some(to) = to {
            self.validator.on_input(to);
        }
    }

    pub fn set_source(&self, account_number: &str) {
        self.edit(|form| {
            form.draft.from_account_number = account_number.to_string();
            form.touched.source = true;
        });
    }

    pub fn set_destination(&self, account_number: &str) {
        self.edit(|form| {
            form.draft.to_account_number = account_number.to_string();
            form.touched.destination = true;
        });
        self.validator.on_input(account_number);
    }

    pub fn set_amount(&self, amount: &str) {
        self.edit(|form| {
            form.draft.amount = amount.to_string();
            form.touched.amount = true;
        });
    }

    pub fn set_description(&self, description: &str) {
        self.edit(|form| {
            form.draft.description = description.to_string();
            form.touched.description = true;
        });
    }

    pub fn set_quick_amount(&self, amount: Decimal) {
        self.set_amount(&amount.normalize().to_string());
    }

    /// Fill in the whole balance of the selected source. Returns `false`
    /// when no source is selected.
    pub fn set_max_amount(&self) -> bool {
        match self.selected_source() {
            Some(source) => {
                self.set_quick_amount(source.balance);
                true
            }
            None => false,
        }
    }

    /// Leave confirmation if shown, otherwise go back to the dashboard
    pub fn cancel(&self) {
        let mut form = self.form();
        if form.confirming {
            form.confirming = false;
        } else {
            drop(form);
            self.navigator.navigate(Route::Dashboard);
        }
    }

    pub fn go_back(&self) {
        self.cancel();
    }

    // ========================================================================
    // Derived state
    // ========================================================================

    #[must_use]
    pub fn draft(&self) -> TransferDraft {
        self.form().draft.clone()
    }

    #[must_use]
    pub fn field_errors(&self) -> FieldErrors {
        self.form().field_errors()
    }

    #[must_use]
    pub fn destination(&self) -> DestinationValidation {
        self.validator.state()
    }

    #[must_use]
    pub fn subscribe_destination(&self) -> watch::Receiver<DestinationValidation> {
        self.validator.subscribe()
    }

    /// Wait for the destination check to finish
    pub async fn destination_settled(&self) -> DestinationValidation {
        self.validator.settled().await
    }

    #[must_use]
    pub fn is_confirming(&self) -> bool {
        self.form().confirming
    }

    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn completed_transfer(&self) -> Option<Transfer> {
        self.form().completed.clone()
    }

    /// Message of the last failed submission
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.form().last_error.clone()
    }

    fn destination_matches(draft: &TransferDraft, destination: &DestinationValidation) -> bool {
        destination.is_valid()
            && destination.account_number.as_deref() == Some(draft.normalized_destination().as_str())
    }

    #[must_use]
    pub fn can_proceed(&self) -> bool {
        let destination = self.validator.state();
        let form = self.form();
        form.field_errors().is_empty()
            && Self::destination_matches(&form.draft, &destination)
            && !self.is_submitting()
    }

    #[must_use]
    pub fn steps(&self) -> [TransferStep; 4] {
        let destination = self.validator.state();
        let form = self.form();
        derive_steps(
            &form.field_errors(),
            &form.touched,
            &destination,
            form.confirming,
            form.completed.is_some(),
        )
    }

    /// Confirmation summary, available only once the form can proceed
    #[must_use]
    pub fn summary(&self) -> Option<TransferSummary> {
        if !self.can_proceed() {
            return None;
        }
        let request = self.form().draft.to_request().ok()?;
        Some(TransferSummary {
            from_account: request.from_account_number,
            to_account: request.to_account_number,
            amount: request.amount,
            description: request
                .description
                .unwrap_or_else(|| "No description".to_string()),
            fees: Decimal::ZERO,
            total_amount: request.amount,
        })
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// First call moves to confirmation; the call made while confirming sends
    /// the transfer.
    #[instrument(skip(self))]
    pub async fn submit(&self) -> SubmitOutcome {
        if self.is_submitting() {
            return SubmitOutcome::AlreadySubmitting;
        }

        let destination = self.validator.state();
        let (request, source_balance) = {
            let mut form = self.form();
            if form.completed.is_some() {
                return SubmitOutcome::AlreadyCompleted;
            }

            let errors = form.field_errors();
            if !errors.is_empty() || !Self::destination_matches(&form.draft, &destination) {
                form.touched = Touched::all();
                return SubmitOutcome::Incomplete {
                    errors,
                    destination,
                };
            }

            if !form.confirming {
                form.confirming = true;
                info!("Awaiting confirmation");
                return SubmitOutcome::AwaitingConfirmation;
            }

            let request = match form.draft.to_request() {
                Ok(request) => request,
                Err(e) => return SubmitOutcome::Failed(e),
            };
            (request, form.source_account().map(|a| a.balance))
        };

        let problems = final_validation(&request, source_balance);
        if !problems.is_empty() {
            warn!(?problems, "Final validation failed");
            for problem in &problems {
                self.notifier.error("Validation error", problem);
            }
            return SubmitOutcome::FinalValidationFailed(problems);
        }

        let Some(_guard) = SubmitGuard::acquire(&self.submitting) else {
            return SubmitOutcome::AlreadySubmitting;
        };

        match self.transfers.create_transfer(&request).await {
            Ok(transfer) => self.on_success(transfer),
            Err(e) => self.on_failure(e),
        }
    }

    fn on_success(&self, transfer: Transfer) -> SubmitOutcome {
        info!(id = transfer.id, amount = %transfer.amount, "Transfer completed");
        {
            let mut form = self.form();
            form.completed = Some(transfer.clone());
            form.confirming = false;
            form.last_error = None;
        }

        self.notifier.success(
            "Transfer successful",
            &format!(
                "{:.2} {} transferred successfully",
                transfer.amount, transfer.from_account.currency
            ),
        );

        let navigator = Arc::clone(&self.navigator);
        let delay = self.redirect_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            navigator.navigate(Route::Dashboard);
        });

        SubmitOutcome::Completed(transfer)
    }

    fn on_failure(&self, err: AppError) -> SubmitOutcome {
        let message = err.user_message();
        error!(error = %err, "Transfer failed");
        {
            let mut form = self.form();
            form.confirming = false;
            form.last_error = Some(message.clone());
        }
        if !err.is_surfaced() {
            self.notifier.error("Transfer failed", &message);
        }
        SubmitOutcome::Failed(err)
    }
}
