use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StreamingPlatform {
    pub id: i64,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPlatform {
    pub name: String,
    pub icon: String,
    pub color: String,
}
