//! Progress indicator for the transfer form.

use crate::domain::{DestinationValidation, FieldErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Source,
    Destination,
    Amount,
    Confirmation,
}

impl StepKind {
    pub const ALL: [StepKind; 4] = [
        StepKind::Source,
        StepKind::Destination,
        StepKind::Amount,
        StepKind::Confirmation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Source => "Source account",
            Self::Destination => "Recipient",
            Self::Amount => "Amount",
            Self::Confirmation => "Confirmation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStep {
    pub kind: StepKind,
    pub completed: bool,
    pub active: bool,
    pub has_error: bool,
}

/// Fields the user has interacted with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Touched {
    pub source: bool,
    pub destination: bool,
    pub amount: bool,
    pub description: bool,
}

impl Touched {
    #[must_use]
    pub fn all() -> Self {
        Self {
            source: true,
            destination: true,
            amount: true,
            description: true,
        }
    }
}

/// Project form state onto the four steps
#[must_use]
pub fn derive_steps(
    errors: &FieldErrors,
    touched: &Touched,
    destination: &DestinationValidation,
    confirming: bool,
    completed: bool,
) -> [TransferStep; 4] {
    let source_done = errors.source.is_none();
    let destination_done = errors.destination.is_none() && destination.is_valid();
    let amount_done = errors.amount.is_none();

    let flags = [
        (source_done, errors.source.is_some() && touched.source),
        (
            destination_done,
            (errors.destination.is_some() && touched.destination) || destination.error.is_some(),
        ),
        (amount_done, errors.amount.is_some() && touched.amount),
    ];

    // While editing, the first unfinished step is active; with everything
    // filled in the amount step stays active until confirmation.
    let editing = flags.iter().position(|(done, _)| !done).unwrap_or(2);

    let mut steps = StepKind::ALL.map(|kind| TransferStep {
        kind,
        completed: false,
        active: false,
        has_error: false,
    });
    for (i, (done, has_error)) in flags.into_iter().enumerate() {
        steps[i].completed = done;
        steps[i].has_error = has_error;
        steps[i].active = !confirming && i == editing;
    }
    steps[3].completed = completed;
    steps[3].active = confirming;

    steps
}
