use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::auth::{password, token, totp};
use crate::config::{SessionConfig, MAX_SESSION_TTL_DAYS};
use crate::database::models::UserProfile;
use crate::database::StorageScope;
use crate::error::ApiError;

/// Issues and resolves session tokens against the store.
///
/// Sessions are never renewed on use; a token is valid until its fixed
/// `expires_at`.
#[derive(Debug, Clone)]
pub struct SessionAuthenticator {
    ttl: Duration,
    totp_skew: u8,
}

impl SessionAuthenticator {
    pub fn new(ttl: Duration, totp_skew: u8) -> Self {
        Self { ttl, totp_skew }
    }

    /// Out-of-range lifetimes fall back to seven days.
    pub fn from_config(config: &SessionConfig) -> Self {
        let ttl = Some(config.ttl_days)
            .filter(|days| (1..=MAX_SESSION_TTL_DAYS).contains(days))
            .and_then(Duration::try_days)
            .unwrap_or_else(|| {
                warn!("Session lifetime of {} days is out of range; using 7", config.ttl_days);
                Duration::days(7)
            });
        Self::new(ttl, config.totp_skew_steps)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create a fresh session for `user_id` and return its token.
    pub async fn issue_session(&self, scope: &mut dyn StorageScope, user_id: i64) -> Result<String, ApiError> {
        let token = token::generate_session_token();
        let expires_at = Utc::now().checked_add_signed(self.ttl).ok_or_else(|| {
            tracing::error!("Session expiry overflows for lifetime {}", self.ttl);
            ApiError::internal_server_error("Failed to create session")
        })?;
        scope.insert_session(user_id, &token, expires_at).await?;
        debug!("Issued session for user {} (expires {})", user_id, expires_at);
        Ok(token)
    }

    pub async fn resolve(&self, scope: &mut dyn StorageScope, token: Option<&str>) -> Result<i64, ApiError> {
        self.resolve_at(scope, token, Utc::now()).await
    }

    /// Owner of `token` if the session is still live at `now`.
    pub async fn resolve_at(
        &self,
        scope: &mut dyn StorageScope,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<i64, ApiError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Session token required"))?;

        match scope.session_user(token, now).await? {
            Some(user_id) => Ok(user_id),
            None => {
                warn!("Rejected unknown or expired session token");
                Err(ApiError::unauthorized("Invalid or expired session"))
            }
        }
    }

    pub async fn register(
        &self,
        scope: &mut dyn StorageScope,
        email: &str,
        password: &str,
        language: &str,
    ) -> Result<(UserProfile, String), ApiError> {
        if scope.email_taken(email).await? {
            return Err(ApiError::conflict("User already exists"));
        }

        let password_hash = hash_blocking(password).await?;
        let user = scope.insert_user(email, &password_hash, language).await?;
        let token = self.issue_session(scope, user.id).await?;
        debug!("Registered user {}", user.id);
        Ok((user, token))
    }

    /// Unknown email and wrong password fail identically.
    pub async fn login(
        &self,
        scope: &mut dyn StorageScope,
        email: &str,
        password: &str,
    ) -> Result<(UserProfile, String), ApiError> {
        let invalid = || ApiError::unauthorized("Invalid credentials");

        let Some(record) = scope.find_login(email).await? else {
            verify_decoy_blocking(password).await;
            warn!("Login rejected");
            return Err(invalid());
        };

        if !verify_blocking(password, &record.password_hash).await? {
            warn!("Login rejected");
            return Err(invalid());
        }

        let user = scope.find_user(record.id).await?.ok_or_else(invalid)?;
        let token = self.issue_session(scope, user.id).await?;
        Ok((user, token))
    }

    /// Store a new secret and enable 2FA. The secret is returned only here.
    pub async fn enable_two_factor(&self, scope: &mut dyn StorageScope, user_id: i64) -> Result<String, ApiError> {
        let secret = token::generate_two_factor_secret();
        scope.enable_two_factor(user_id, &secret).await?;
        debug!("Enabled two-factor authentication for user {}", user_id);
        Ok(secret)
    }

    pub async fn verify_two_factor(
        &self,
        scope: &mut dyn StorageScope,
        user_id: i64,
        code: &str,
    ) -> Result<(), ApiError> {
        self.verify_two_factor_at(scope, user_id, code, Utc::now()).await
    }

    pub async fn verify_two_factor_at(
        &self,
        scope: &mut dyn StorageScope,
        user_id: i64,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        let secret = scope
            .two_factor_secret(user_id)
            .await?
            .ok_or_else(|| ApiError::bad_request("Two-factor authentication is not enabled"))?;

        if totp::verify(&secret, code, now, self.totp_skew) {
            Ok(())
        } else {
            warn!("Two-factor code rejected for user {}", user_id);
            Err(ApiError::unauthorized("Invalid verification code"))
        }
    }
}

// Argon2 is deliberately slow; keep it off the async workers.
async fn hash_blocking(password: &str) -> Result<String, ApiError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| {
            tracing::error!("Password hashing task failed: {}", e);
            ApiError::internal_server_error("Failed to process credentials")
        })?
        .map_err(|e| {
            tracing::error!("Password hashing failed: {}", e);
            ApiError::internal_server_error("Failed to process credentials")
        })
}

async fn verify_blocking(password: &str, hash: &str) -> Result<bool, ApiError> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
        .await
        .map_err(|e| {
            tracing::error!("Password verification task failed: {}", e);
            ApiError::internal_server_error("Failed to process credentials")
        })
}

async fn verify_decoy_blocking(password: &str) {
    let password = password.to_string();
    let _ = tokio::task::spawn_blocking(move || password::verify_decoy(&password)).await;
}
