use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Public view of a user row. Never carries the password hash or 2FA secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub language: String,
    pub theme: String,
    pub two_fa_enabled: bool,
    pub analytics_enabled: bool,
    pub action_logging_enabled: bool,
}

/// Columns needed to check a login attempt.
#[derive(Debug, Clone, FromRow)]
pub struct LoginRecord {
    pub id: i64,
    pub password_hash: String,
}
