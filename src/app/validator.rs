//! Debounced destination-account validation.
//!
//! Every edit bumps a generation counter. The debounce timer and the lookup
//! both carry the generation they were started for, and a result is only
//! published if that generation is still the accepted one when it arrives.
//! Superseded lookups keep running on the network but their answers are
//! dropped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::types::{ACCOUNT_NUMBER_MIN_LENGTH, normalize_account_number};
use crate::domain::{AccountGateway, DestinationValidation, ValidationPhase};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);

/// A value that made it through the debounce
struct Debounced {
    value: String,
    generation: u64,
    /// `None` while the lookup is in flight
    result: Option<DestinationValidation>,
}

struct Control {
    generation: u64,
    /// Generation whose lookup may publish
    accepted: u64,
    current: String,
    own_accounts: HashSet<String>,
    timer: Option<JoinHandle<()>>,
    debounced: Option<Debounced>,
    /// Last Valid/Invalid answer, reused when the same value comes back
    last_settled: Option<DestinationValidation>,
}

impl Control {
    /// Start a new generation and make it the only one allowed to publish
    fn supersede(&mut self) -> u64 {
        self.generation += 1;
        self.accepted = self.generation;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation
    }
}

struct Inner {
    gateway: Arc<dyn AccountGateway>,
    debounce: Duration,
    state: watch::Sender<DestinationValidation>,
    control: Mutex<Control>,
}

impl Inner {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: DestinationValidation) {
        self.state.send_replace(state);
    }

    /// Publish `debouncing` and arm the timer for the current generation
    fn schedule(self: &Arc<Self>, control: &mut Control, value: String) {
        self.publish(DestinationValidation::debouncing(&value));

        let generation = control.generation;
        let inner = Arc::clone(self);
        control.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            // Aborting this timer later must not cancel the lookup
            tokio::spawn(inner.lookup(generation, value));
        }));
    }

    async fn lookup(self: Arc<Self>, generation: u64, account_number: String) {
        {
            let mut control = self.control();
            if control.accepted != generation {
                return;
            }
            if control.own_accounts.contains(&account_number) {
                let state = DestinationValidation::own_account(&account_number);
                control.last_settled = Some(state.clone());
                control.debounced = Some(Debounced {
                    value: account_number,
                    generation,
                    result: Some(state.clone()),
                });
                self.publish(state);
                return;
            }
            control.debounced = Some(Debounced {
                value: account_number.clone(),
                generation,
                result: None,
            });
            self.publish(DestinationValidation::validating(&account_number));
        }

        debug!(account_number = %account_number, generation, "Looking up destination account");
        let result = self.gateway.account_exists(&account_number).await;

        let mut control = self.control();
        let state = match result {
            Ok(true) => DestinationValidation::valid(&account_number),
            Ok(false) => DestinationValidation::not_found(&account_number),
            Err(e) => {
                warn!(account_number = %account_number, error = %e, "Destination lookup failed");
                DestinationValidation::lookup_failed(&account_number)
            }
        };
        if let Some(debounced) = control
            .debounced
            .as_mut()
            .filter(|d| d.generation == generation)
        {
            debounced.result = Some(state.clone());
        }

        if control.accepted != generation {
            debug!(account_number = %account_number, generation, "Dropping superseded lookup");
            return;
        }
        if state.phase != ValidationPhase::Error {
            control.last_settled = Some(state.clone());
        }
        self.publish(state);
    }
}

/// Validates the destination field as the user types.
///
/// Observe transitions with [`DestinationValidator::subscribe`].
pub struct DestinationValidator {
    inner: Arc<Inner>,
}

impl DestinationValidator {
    #[must_use]
    pub fn new(gateway: Arc<dyn AccountGateway>, debounce: Duration) -> Self {
        let (state, _) = watch::channel(DestinationValidation::idle());
        Self {
            inner: Arc::new(Inner {
                gateway,
                debounce,
                state,
                control: Mutex::new(Control {
                    generation: 0,
                    accepted: 0,
                    current: String::new(),
                    own_accounts: HashSet::new(),
                    timer: None,
                    debounced: None,
                    last_settled: None,
                }),
            }),
        }
    }

    /// Feed the raw field content after an edit. Must be called from within
    /// a tokio runtime.
    ///
    /// Coming back to the last debounced value before the timer fires again
    /// does not start a second lookup: the earlier lookup, or its answer,
    /// stands.
    pub fn on_input(&self, raw: &str) {
        let value = normalize_account_number(raw);
        let mut control = self.inner.control();
        if value == control.current {
            return;
        }

        control.current = value.clone();
        control.supersede();

        if value.chars().count() < ACCOUNT_NUMBER_MIN_LENGTH {
            control.debounced = None;
            self.inner.publish(DestinationValidation::idle());
            return;
        }

        let resumed = control
            .debounced
            .as_ref()
            .filter(|d| d.value == value)
            .map(|d| (d.generation, d.result.clone()));
        if let Some((generation, result)) = resumed {
            control.accepted = generation;
            self.inner.publish(
                result.unwrap_or_else(|| DestinationValidation::validating(&value)),
            );
            return;
        }

        if let Some(settled) = control
            .last_settled
            .as_ref()
            .filter(|s| s.account_number.as_deref() == Some(value.as_str()))
        {
            self.inner.publish(settled.clone());
            return;
        }

        self.inner.schedule(&mut control, value);
    }

    /// Replace the set of the user's own account numbers
    pub fn set_own_accounts<I, S>(&self, numbers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut control = self.inner.control();
        control.own_accounts = numbers
            .into_iter()
            .map(|n| normalize_account_number(n.as_ref()))
            .collect();
        control.last_settled = None;
        control.debounced = None;

        let current = control.current.clone();
        if control.own_accounts.contains(&current) {
            control.supersede();
            self.inner
                .publish(DestinationValidation::own_account(&current));
        } else if *self.inner.state.borrow() == DestinationValidation::own_account(&current) {
            // No longer one of ours: check it like any other account
            control.supersede();
            self.inner.schedule(&mut control, current);
        }
    }

    /// Forget the current value and return to idle
    pub fn reset(&self) {
        let mut control = self.inner.control();
        control.supersede();
        control.current.clear();
        control.debounced = None;
        self.inner.publish(DestinationValidation::idle());
    }

    #[must_use]
    pub fn state(&self) -> DestinationValidation {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DestinationValidation> {
        self.inner.state.subscribe()
    }

    /// Wait until no timer or lookup is outstanding
    pub async fn settled(&self) -> DestinationValidation {
        let mut receiver = self.subscribe();
        match receiver.wait_for(DestinationValidation::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }
}

impl Drop for DestinationValidator {
    fn drop(&mut self) {
        if let Some(timer) = self.inner.control().timer.take() {
            timer.abort();
        }
    }
}
