//! Authentication endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use super::envelope;
use crate::domain::{AppError, AuthGateway, LoginRequest, LoginResponse, RegisterRequest};
use crate::infra::http::RequestPipeline;

pub struct HttpAuthGateway {
    pipeline: Arc<RequestPipeline>,
}

impl HttpAuthGateway {
    #[must_use]
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AppError> {
        let response = self.pipeline.post("/auth/login", request).await?;
        let login = envelope::<LoginResponse>(&response)?.into_data("Login failed")?;
        info!(user_id = login.user.id, "Login accepted");
        Ok(login)
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn register(&self, request: &RegisterRequest) -> Result<(), AppError> {
        let response = self.pipeline.post("/auth/register", request).await?;
        envelope::<serde_json::Value>(&response)?.into_optional("Registration failed")?;
        info!("Registration accepted");
        Ok(())
    }
}
