//! Transfer endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use super::envelope;
use crate::domain::{AppError, CreateTransferRequest, Transfer, TransferGateway};
use crate::infra::http::RequestPipeline;

pub struct HttpTransferGateway {
    pipeline: Arc<RequestPipeline>,
}

impl HttpTransferGateway {
    #[must_use]
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl TransferGateway for HttpTransferGateway {
    #[instrument(skip(self, request), fields(from = %request.from_account_number, to = %request.to_account_number, amount = %request.amount))]
    async fn create_transfer(&self, request: &CreateTransferRequest) -> Result<Transfer, AppError> {
        let response = self.pipeline.post("/transfers", request).await?;
        let transfer = envelope::<Transfer>(&response)?.into_data("Transfer failed")?;
        info!(id = transfer.id, status = %transfer.status, "Transfer created");
        Ok(transfer)
    }

    #[instrument(skip(self))]
    async fn list_transfers(&self) -> Result<Vec<Transfer>, AppError> {
        let response = self.pipeline.get("/transfers").await?;
        Ok(envelope::<Vec<Transfer>>(&response)?
            .into_optional("Failed to load transfer history")?
            .unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn get_transfer(&self, id: i64) -> Result<Transfer, AppError> {
        let response = self.pipeline.get(&format!("/transfers/{id}")).await?;
        envelope::<Transfer>(&response)?.into_data("Transfer not found")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransferStatus;
    use crate::test_utils::{MockReply, MockTransport};
    use reqwest::Url;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn gateway(transport: Arc<MockTransport>) -> HttpTransferGateway {
        let pipeline =
            RequestPipeline::builder(Url::parse("http://bank.test/api").unwrap(), transport).build();
        HttpTransferGateway::new(Arc::new(pipeline))
    }

    fn transfer_json(id: i64) -> serde_json::Value {
        let account = |number: &str| {
            json!({
                "id": 1,
                "accountNumber": number,
                "balance": 10.0,
                "currency": "EUR",
                "user": {"id": 1, "firstName": "A", "lastName": "B"}
            })
        };
        json!({
            "id": id,
            "fromAccount": account("AAAA111111"),
            "toAccount": account("BBBB222222"),
            "amount": 25.5,
            "description": "Rent",
            "status": "COMPLETED",
            "createdAt": "2024-05-01T08:30:00"
        })
    }

    #[tokio::test]
    async fn test_create_transfer_posts_body() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            "POST",
            "/api/transfers",
            MockReply::json(json!({"success": true, "data": transfer_json(9)})),
        );

        let request = CreateTransferRequest {
            from_account_number: "AAAA111111".to_string(),
            to_account_number: "BBBB222222".to_string(),
            amount: Decimal::new(2550, 2),
            description: None,
        };
        let transfer = gateway(transport.clone())
            .create_transfer(&request)
            .await
            .unwrap();

        assert_eq!(transfer.id, 9);
        assert_eq!(transfer.status, TransferStatus::Completed);
        let body = transport.calls()[0].body.clone().unwrap();
        assert_eq!(
            body,
            json!({
                "fromAccountNumber": "AAAA111111",
                "toAccountNumber": "BBBB222222",
                "amount": 25.5
            })
        );
    }

    #[tokio::test]
    async fn test_create_transfer_rejection_uses_fallback() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            "POST",
            "/api/transfers",
            MockReply::json(json!({"success": false, "message": ""})),
        );

        let request = CreateTransferRequest {
            from_account_number: "AAAA111111".to_string(),
            to_account_number: "BBBB222222".to_string(),
            amount: Decimal::ONE,
            description: None,
        };
        let err = gateway(transport).create_transfer(&request).await.unwrap_err();
        assert_eq!(err, AppError::Rejected("Transfer failed".to_string()));
    }

    #[tokio::test]
    async fn test_history_and_lookup() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            "GET",
            "/api/transfers",
            MockReply::json(json!({"success": true, "data": [transfer_json(1), transfer_json(2)]})),
        );
        transport.respond(
            "GET",
            "/api/transfers/2",
            MockReply::json(json!({"success": true, "data": transfer_json(2)})),
        );
        let gateway = gateway(transport);

        assert_eq!(gateway.list_transfers().await.unwrap().len(), 2);
        assert_eq!(gateway.get_transfer(2).await.unwrap().id, 2);
    }
}
