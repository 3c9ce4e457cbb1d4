//! Sign-in workflow and protected-route guard.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use validator::Validate;

use super::session::SessionStore;
use crate::domain::{
    AppError, AuthGateway, LoginRequest, Navigator, NotificationSink, RegisterRequest, Route,
    User, ValidationError,
};

/// Login, registration, and logout on top of the [`SessionStore`]
pub struct AuthService {
    gateway: Arc<dyn AuthGateway>,
    session: Arc<SessionStore>,
    navigator: Arc<dyn Navigator>,
}

impl AuthService {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn AuthGateway>,
        session: Arc<SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            gateway,
            session,
            navigator,
        }
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AppError> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        request.validate().map_err(|e| {
            warn!(error = %e, "Login input rejected");
            AppError::Validation(ValidationError::Multiple(e.to_string()))
        })?;

        let response = self.gateway.login(&request).await?;
        self.session
            .login_succeeded(&response.token, response.user.clone())?;
        info!(user_id = response.user.id, "Signed in");
        Ok(response.user)
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<(), AppError> {
        request.validate().map_err(|e| {
            warn!(error = %e, "Registration input rejected");
            AppError::Validation(ValidationError::Multiple(e.to_string()))
        })?;

        self.gateway.register(request).await
    }

    pub fn logout(&self) {
        self.session.logout();
        self.navigator.navigate(Route::login());
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }
}

/// Decides whether a protected route may be entered
pub struct AuthGuard {
    session: Arc<SessionStore>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn NotificationSink>,
}

impl AuthGuard {
    #[must_use]
    pub fn new(
        session: Arc<SessionStore>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            session,
            navigator,
            notifier,
        }
    }

    /// `true` when signed in with an unexpired token. Otherwise signs out and
    /// redirects to login, remembering `url` as the return target.
    pub fn can_activate(&self, url: &str) -> bool {
        if self.session.is_authenticated() && !self.session.is_token_expired() {
            return true;
        }

        if self.session.is_authenticated() {
            warn!(url, "Token expired, denying route");
            self.notifier
                .warning("Session expired", "Please sign in again to continue.");
            self.session.logout();
        }

        self.navigator.navigate(Route::Login {
            return_url: Some(url.to_string()),
        });
        false
    }
}
