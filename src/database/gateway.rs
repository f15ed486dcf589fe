//! Storage seam used by the handlers.
//!
//! A request acquires exactly one [`StorageScope`] and either commits it or
//! drops it. Dropping an uncommitted scope discards its writes and releases
//! the underlying connection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::database::manager::DatabaseError;
use crate::database::models::{
    FileRecord, Game, LoginRecord, NewFile, NewGame, NewPlatform, StreamingPlatform, UserProfile,
};
use crate::database::patch::Patch;

#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Borrow a connection for the lifetime of one request.
    async fn acquire(&self) -> Result<Box<dyn StorageScope>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

/// One request's unit of work. Every owned-resource method is scoped by
/// `user_id`; rows belonging to other users behave as if absent.
#[async_trait]
pub trait StorageScope: Send {
    // Users
    async fn email_taken(&mut self, email: &str) -> Result<bool, DatabaseError>;
    /// Fails with [`DatabaseError::Conflict`] when the email is already registered.
    async fn insert_user(
        &mut self,
        email: &str,
        password_hash: &str,
        language: &str,
    ) -> Result<UserProfile, DatabaseError>;
    async fn find_login(&mut self, email: &str) -> Result<Option<LoginRecord>, DatabaseError>;
    async fn find_user(&mut self, user_id: i64) -> Result<Option<UserProfile>, DatabaseError>;
    async fn update_user(&mut self, user_id: i64, patch: &Patch) -> Result<Option<UserProfile>, DatabaseError>;
    async fn enable_two_factor(&mut self, user_id: i64, secret: &str) -> Result<(), DatabaseError>;
    /// The stored secret, only when 2FA is enabled.
    async fn two_factor_secret(&mut self, user_id: i64) -> Result<Option<String>, DatabaseError>;

    // Sessions
    async fn insert_session(
        &mut self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;
    /// Owner of `token` when its `expires_at` is after `now`.
    async fn session_user(&mut self, token: &str, now: DateTime<Utc>) -> Result<Option<i64>, DatabaseError>;

    // Files
    async fn list_files(&mut self, user_id: i64) -> Result<Vec<FileRecord>, DatabaseError>;
    async fn insert_file(&mut self, user_id: i64, file: &NewFile) -> Result<FileRecord, DatabaseError>;
    async fn find_file(&mut self, user_id: i64, file_id: i64) -> Result<Option<FileRecord>, DatabaseError>;
    async fn delete_file(&mut self, user_id: i64, file_id: i64) -> Result<bool, DatabaseError>;

    // Games
    async fn list_games(&mut self, user_id: i64) -> Result<Vec<Game>, DatabaseError>;
    async fn insert_game(&mut self, user_id: i64, game: &NewGame) -> Result<Game, DatabaseError>;
    async fn update_game(&mut self, user_id: i64, game_id: i64, patch: &Patch) -> Result<Option<Game>, DatabaseError>;
    async fn delete_game(&mut self, user_id: i64, game_id: i64) -> Result<bool, DatabaseError>;

    // Streaming platforms
    async fn list_platforms(&mut self, user_id: i64) -> Result<Vec<StreamingPlatform>, DatabaseError>;
    async fn insert_platform(
        &mut self,
        user_id: i64,
        platform: &NewPlatform,
    ) -> Result<StreamingPlatform, DatabaseError>;
    async fn update_platform(
        &mut self,
        user_id: i64,
        platform_id: i64,
        patch: &Patch,
    ) -> Result<Option<StreamingPlatform>, DatabaseError>;
    async fn delete_platform(&mut self, user_id: i64, platform_id: i64) -> Result<bool, DatabaseError>;

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;
}
