//! Typed gateways over the request pipeline.

pub mod accounts;
pub mod auth;
pub mod transfers;

use serde::de::DeserializeOwned;

use super::http::ApiResponse;
use crate::domain::{ApiEnvelope, AppError};

pub use accounts::HttpAccountGateway;
pub use auth::HttpAuthGateway;
pub use transfers::HttpTransferGateway;

/// Decode the `{ success, message, data }` envelope of a response
fn envelope<T: DeserializeOwned>(response: &ApiResponse) -> Result<ApiEnvelope<T>, AppError> {
    response.json::<ApiEnvelope<T>>()
}
