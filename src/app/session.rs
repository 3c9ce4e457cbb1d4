//! Current authentication state and its persistence.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::domain::{AppError, KeyValueStore, SessionProvider, StorageError, User, UserProfile};

pub const TOKEN_KEY: &str = "authToken";
pub const USER_KEY: &str = "currentUser";

/// Token and user of a signed-in session; one never exists without the other
#[derive(Debug)]
pub struct AuthenticatedSession {
    pub token: SecretString,
    pub user: User,
}

/// Process-wide session holder backed by a [`KeyValueStore`]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    current: RwLock<Option<AuthenticatedSession>>,
}

impl SessionStore {
    /// Empty session that persists into `storage`
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            current: RwLock::new(None),
        }
    }

    /// Load a previously persisted session. A corrupt user record clears
    /// both keys and yields a signed-out store.
    pub fn restore(storage: Arc<dyn KeyValueStore>) -> Result<Self, AppError> {
        let store = Self::new(storage);

        let token = store.storage.get(TOKEN_KEY)?;
        let user = store.storage.get(USER_KEY)?;

        if let (Some(token), Some(raw_user)) = (token, user) {
            match serde_json::from_str::<User>(&raw_user) {
                Ok(user) => {
                    debug!(user_id = user.id, "Restored persisted session");
                    *store.write() = Some(AuthenticatedSession {
                        token: SecretString::from(token),
                        user,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Persisted user is unreadable, clearing session");
                    store.clear_persisted();
                }
            }
        }

        Ok(store)
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<AuthenticatedSession>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<AuthenticatedSession>> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear_persisted(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "Failed to remove persisted session key");
            }
        }
    }

    /// Record a successful login and persist it
    pub fn login_succeeded(&self, token: &str, user: User) -> Result<(), AppError> {
        let raw_user =
            serde_json::to_string(&user).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.storage.set(TOKEN_KEY, token)?;
        self.storage.set(USER_KEY, &raw_user)?;

        info!(user_id = user.id, "Session started");
        *self.write() = Some(AuthenticatedSession {
            token: SecretString::from(token.to_string()),
            user,
        });
        Ok(())
    }

    /// Clear the session. Returns `true` if one was active.
    pub fn logout(&self) -> bool {
        let previous = self.write().take();
        self.clear_persisted();
        if let Some(session) = &previous {
            info!(user_id = session.user.id, "Session ended");
        }
        previous.is_some()
    }

    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.read()
            .as_ref()
            .map(|s| SecretString::from(s.token.expose_secret().to_string()))
    }

    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.read().as_ref().map(|s| s.user.clone())
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    #[must_use]
    pub fn profile(&self) -> Option<UserProfile> {
        self.read().as_ref().map(|s| UserProfile::from(&s.user))
    }

    /// `exp` claim of the current token, read without verifying the signature
    #[must_use]
    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.read()
            .as_ref()
            .and_then(|s| token_expiry(s.token.expose_secret()))
    }

    /// No token, an unreadable token, or one past its `exp` all count as expired
    #[must_use]
    pub fn is_token_expired(&self) -> bool {
        self.is_token_expired_at(Utc::now())
    }

    #[must_use]
    pub fn is_token_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.token_expiry() {
            Some(expiry) => now > expiry,
            None => true,
        }
    }
}

impl SessionProvider for SessionStore {
    fn bearer_token(&self) -> Option<SecretString> {
        self.token()
    }

    fn expire(&self) -> bool {
        self.logout()
    }
}

/// Decode the `exp` claim of a JWT payload
#[must_use]
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let trimmed = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_f64()?;
    DateTime::from_timestamp_millis((exp * 1000.0) as i64)
}
