//! Account endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::envelope;
use crate::domain::{Account, AccountGateway, AppError};
use crate::infra::http::RequestPipeline;

pub struct HttpAccountGateway {
    pipeline: Arc<RequestPipeline>,
}

impl HttpAccountGateway {
    #[must_use]
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    fn decode_list(response: &crate::infra::http::ApiResponse) -> Result<Vec<Account>, AppError> {
        let accounts = envelope::<Vec<Account>>(response)?
            .into_optional("Failed to load accounts")?
            .unwrap_or_default();
        debug!(count = accounts.len(), "Accounts loaded");
        Ok(accounts)
    }
}

#[async_trait]
impl AccountGateway for HttpAccountGateway {
    #[instrument(skip(self))]
    async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        let response = self.pipeline.get("/accounts").await?;
        Self::decode_list(&response)
    }

    #[instrument(skip(self))]
    async fn refresh_accounts(&self) -> Result<Vec<Account>, AppError> {
        let response = self.pipeline.get_uncached("/accounts").await?;
        Self::decode_list(&response)
    }

    #[instrument(skip(self))]
    async fn get_account(&self, account_number: &str) -> Result<Account, AppError> {
        let response = self
            .pipeline
            .get(&format!("/accounts/{account_number}"))
            .await?;
        envelope::<Account>(&response)?.into_data("Account not found")
    }

    #[instrument(skip(self))]
    async fn account_exists(&self, account_number: &str) -> Result<bool, AppError> {
        let response = self
            .pipeline
            .get_with_query("/accounts/search", &[("accountNumber", account_number)])
            .await?;
        let exists = envelope::<bool>(&response)?
            .into_optional("Failed to verify account")?
            .unwrap_or(false);
        debug!(account_number = %account_number, exists, "Account lookup finished");
        Ok(exists)
    }
}
