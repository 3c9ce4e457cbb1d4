//! Application layer containing client workflows and shared state.

pub mod auth;
pub mod config;
pub mod notifications;
pub mod orchestrator;
pub mod session;
pub mod state;
pub mod steps;
pub mod validator;

pub use auth::{AuthGuard, AuthService};
pub use config::ClientConfig;
pub use notifications::{ActiveNotification, NotificationCenter};
pub use orchestrator::{SubmitOutcome, TransferOrchestrator, TransferSummary, final_validation};
pub use session::{AuthenticatedSession, SessionStore};
pub use state::ClientContext;
pub use steps::{StepKind, Touched, TransferStep, derive_steps};
pub use validator::DestinationValidator;
