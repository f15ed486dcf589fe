use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgArguments, PgRow},
    FromRow, PgPool, Postgres, Transaction,
};

use crate::database::gateway::{StorageGateway, StorageScope};
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{
    FileRecord, Game, LoginRecord, NewFile, NewGame, NewPlatform, StreamingPlatform, UserProfile,
};
use crate::database::patch::{Patch, PatchValue, UpdateTarget};

const USER_COLUMNS: &str =
    "id, email, language, theme, two_fa_enabled, analytics_enabled, action_logging_enabled";
const FILE_COLUMNS: &str = "id, name, size, type, storage_key, created_at";
const GAME_COLUMNS: &str = "id, name, hours, status, created_at, updated_at";
const PLATFORM_COLUMNS: &str = "id, name, icon, color, status, created_at";

const USERS: UpdateTarget = UpdateTarget {
    table: "users",
    keys: &["id"],
    live_only: false,
    returning: USER_COLUMNS,
};

const GAMES: UpdateTarget = UpdateTarget {
    table: "games",
    keys: &["id", "user_id"],
    live_only: true,
    returning: GAME_COLUMNS,
};

const PLATFORMS: UpdateTarget = UpdateTarget {
    table: "streaming_platforms",
    keys: &["id", "user_id"],
    live_only: true,
    returning: PLATFORM_COLUMNS,
};

/// Pool-backed gateway. Each acquired scope is a transaction on one pooled
/// connection.
#[derive(Clone)]
pub struct PgGateway {
    pool: PgPool,
}

impl PgGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StorageGateway for PgGateway {
    async fn acquire(&self) -> Result<Box<dyn StorageScope>, DatabaseError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgScope { tx }))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}

/// Dropping the transaction without commit rolls back and hands the
/// connection back to the pool.
pub struct PgScope {
    tx: Transaction<'static, Postgres>,
}

impl PgScope {
    async fn apply_patch<T>(&mut self, target: &UpdateTarget, patch: &Patch, keys: &[i64]) -> Result<Option<T>, DatabaseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let sql = patch.to_sql(target);
        let mut q = sqlx::query_as::<_, T>(&sql);
        for assignment in patch.assignments() {
            q = bind_patch_value(q, &assignment.value);
        }
        for key in keys {
            q = q.bind(*key);
        }
        Ok(q.fetch_optional(&mut *self.tx).await?)
    }

    async fn soft_delete(&mut self, table: &'static str, user_id: i64, id: i64) -> Result<bool, DatabaseError> {
        let sql = format!(
            "UPDATE {} SET deleted_at = NOW() WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
            table
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl StorageScope for PgScope {
    async fn email_taken(&mut self, email: &str) -> Result<bool, DatabaseError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(found.is_some())
    }

    async fn insert_user(
        &mut self,
        email: &str,
        password_hash: &str,
        language: &str,
    ) -> Result<UserProfile, DatabaseError> {
        let sql = format!(
            "INSERT INTO users (email, password_hash, language) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserProfile>(&sql)
            .bind(email)
            .bind(password_hash)
            .bind(language)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| conflict_or(e, "User already exists"))
    }

    async fn find_login(&mut self, email: &str) -> Result<Option<LoginRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, LoginRecord>("SELECT id, password_hash FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(record)
    }

    async fn find_user(&mut self, user_id: i64) -> Result<Option<UserProfile>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn update_user(&mut self, user_id: i64, patch: &Patch) -> Result<Option<UserProfile>, DatabaseError> {
        self.apply_patch(&USERS, patch, &[user_id]).await
    }

    async fn enable_two_factor(&mut self, user_id: i64, secret: &str) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE users SET two_fa_secret = $1, two_fa_enabled = TRUE WHERE id = $2")
            .bind(secret)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn two_factor_secret(&mut self, user_id: i64) -> Result<Option<String>, DatabaseError> {
        let secret: Option<Option<String>> =
            sqlx::query_scalar("SELECT two_fa_secret FROM users WHERE id = $1 AND two_fa_enabled = TRUE")
                .bind(user_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(secret.flatten())
    }

    async fn insert_session(
        &mut self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO sessions (user_id, session_token, expires_at) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(token)
            .bind(expires_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn session_user(&mut self, token: &str, now: DateTime<Utc>) -> Result<Option<i64>, DatabaseError> {
        let user_id: Option<i64> = sqlx::query_scalar(
            "SELECT s.user_id FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.session_token = $1 AND s.expires_at > $2",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(user_id)
    }

    async fn list_files(&mut self, user_id: i64) -> Result<Vec<FileRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM files WHERE user_id = $1 AND deleted_at IS NULL ORDER BY created_at DESC, id DESC",
            FILE_COLUMNS
        );
        let files = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(files)
    }

    async fn insert_file(&mut self, user_id: i64, file: &NewFile) -> Result<FileRecord, DatabaseError> {
        let sql = format!(
            "INSERT INTO files (user_id, name, size, type, storage_key) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            FILE_COLUMNS
        );
        let record = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(user_id)
            .bind(&file.name)
            .bind(file.size)
            .bind(&file.file_type)
            .bind(&file.storage_key)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(record)
    }

    async fn find_file(&mut self, user_id: i64, file_id: i64) -> Result<Option<FileRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM files WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
            FILE_COLUMNS
        );
        let record = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(file_id)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(record)
    }

    async fn delete_file(&mut self, user_id: i64, file_id: i64) -> Result<bool, DatabaseError> {
        self.soft_delete("files", user_id, file_id).await
    }

    async fn list_games(&mut self, user_id: i64) -> Result<Vec<Game>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM games WHERE user_id = $1 AND deleted_at IS NULL ORDER BY updated_at DESC, id DESC",
            GAME_COLUMNS
        );
        let games = sqlx::query_as::<_, Game>(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(games)
    }

    async fn insert_game(&mut self, user_id: i64, game: &NewGame) -> Result<Game, DatabaseError> {
        let sql = format!(
            "INSERT INTO games (user_id, name, hours, status) VALUES ($1, $2, $3, $4) RETURNING {}",
            GAME_COLUMNS
        );
        let record = sqlx::query_as::<_, Game>(&sql)
            .bind(user_id)
            .bind(&game.name)
            .bind(game.hours)
            .bind(&game.status)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(record)
    }

    async fn update_game(&mut self, user_id: i64, game_id: i64, patch: &Patch) -> Result<Option<Game>, DatabaseError> {
        self.apply_patch(&GAMES, patch, &[game_id, user_id]).await
    }

    async fn delete_game(&mut self, user_id: i64, game_id: i64) -> Result<bool, DatabaseError> {
        self.soft_delete("games", user_id, game_id).await
    }

    async fn list_platforms(&mut self, user_id: i64) -> Result<Vec<StreamingPlatform>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM streaming_platforms WHERE user_id = $1 AND deleted_at IS NULL ORDER BY created_at DESC, id DESC",
            PLATFORM_COLUMNS
        );
        let platforms = sqlx::query_as::<_, StreamingPlatform>(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(platforms)
    }

    async fn insert_platform(
        &mut self,
        user_id: i64,
        platform: &NewPlatform,
    ) -> Result<StreamingPlatform, DatabaseError> {
        let sql = format!(
            "INSERT INTO streaming_platforms (user_id, name, icon, color) VALUES ($1, $2, $3, $4) RETURNING {}",
            PLATFORM_COLUMNS
        );
        let record = sqlx::query_as::<_, StreamingPlatform>(&sql)
            .bind(user_id)
            .bind(&platform.name)
            .bind(&platform.icon)
            .bind(&platform.color)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(record)
    }

    async fn update_platform(
        &mut self,
        user_id: i64,
        platform_id: i64,
        patch: &Patch,
    ) -> Result<Option<StreamingPlatform>, DatabaseError> {
        self.apply_patch(&PLATFORMS, patch, &[platform_id, user_id]).await
    }

    async fn delete_platform(&mut self, user_id: i64, platform_id: i64) -> Result<bool, DatabaseError> {
        self.soft_delete("streaming_platforms", user_id, platform_id).await
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        self.tx.commit().await?;
        Ok(())
    }
}

fn conflict_or(err: sqlx::Error, message: &str) -> DatabaseError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DatabaseError::Conflict(message.to_string())
        }
        _ => DatabaseError::Sqlx(err),
    }
}

fn bind_patch_value<'q, O>(
    q: sqlx::query::QueryAs<'q, Postgres, O, PgArguments>,
    v: &'q PatchValue,
) -> sqlx::query::QueryAs<'q, Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, PgRow>,
{
    match v {
        PatchValue::Text(s) => q.bind(s.as_str()),
        PatchValue::Number(n) => q.bind(*n),
        PatchValue::Bool(b) => q.bind(*b),
    }
}
