#![allow(dead_code)]

//! In-memory storage gateway so handler contracts can be exercised without
//! a live Postgres. A scope works on a private copy of the store and only
//! publishes it on commit, so a dropped scope discards its writes the same
//! way a rolled-back transaction does.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use dashboard_api::api::{Envelope, HandlerRequest};
use dashboard_api::auth::SessionAuthenticator;
use dashboard_api::database::models::{
    FileRecord, Game, LoginRecord, NewFile, NewGame, NewPlatform, StreamingPlatform, UserProfile,
};
use dashboard_api::database::{DatabaseError, Patch, PatchValue, StorageGateway, StorageScope};
use dashboard_api::handlers::{self, AppState};

#[derive(Debug, Clone)]
struct UserRow {
    profile: UserProfile,
    password_hash: String,
    two_fa_secret: Option<String>,
}

#[derive(Debug, Clone)]
struct SessionRow {
    user_id: i64,
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Owned<T> {
    user_id: i64,
    row: T,
    deleted: bool,
}

#[derive(Debug, Clone, Default)]
struct Store {
    users: Vec<UserRow>,
    sessions: Vec<SessionRow>,
    files: Vec<Owned<FileRecord>>,
    games: Vec<Owned<Game>>,
    platforms: Vec<Owned<StreamingPlatform>>,
    next_id: i64,
    ticks: i64,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Strictly increasing timestamps keep ordering deterministic.
    fn now(&mut self) -> DateTime<Utc> {
        self.ticks += 1;
        Utc::now() + Duration::milliseconds(self.ticks)
    }
}

fn live<T: Clone>(rows: &[Owned<T>], user_id: i64) -> Vec<T> {
    rows.iter()
        .filter(|r| r.user_id == user_id && !r.deleted)
        .map(|r| r.row.clone())
        .collect()
}

fn live_mut<T, F>(rows: &mut [Owned<T>], user_id: i64, pred: F) -> Option<&mut Owned<T>>
where
    F: Fn(&T) -> bool,
{
    rows.iter_mut().find(|r| r.user_id == user_id && !r.deleted && pred(&r.row))
}

fn text(value: &PatchValue) -> String {
    match value {
        PatchValue::Text(s) => s.clone(),
        other => panic!("expected text, got {:?}", other),
    }
}

fn flag(value: &PatchValue) -> bool {
    match value {
        PatchValue::Bool(b) => *b,
        other => panic!("expected bool, got {:?}", other),
    }
}

fn number(value: &PatchValue) -> f64 {
    match value {
        PatchValue::Number(n) => *n,
        other => panic!("expected number, got {:?}", other),
    }
}

#[derive(Default)]
pub struct MemoryGateway {
    store: Arc<Mutex<Store>>,
    open_scopes: Arc<AtomicUsize>,
    commits: Arc<AtomicUsize>,
    unavailable: AtomicBool,
}

impl MemoryGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Scopes acquired and not yet dropped.
    pub fn open_scopes(&self) -> usize {
        self.open_scopes.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Make every acquire fail the way an exhausted pool does.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn stored_password_hash(&self, email: &str) -> Option<String> {
        let store = self.store.lock().unwrap();
        store
            .users
            .iter()
            .find(|u| u.profile.email == email)
            .map(|u| u.password_hash.clone())
    }

    pub fn session_count(&self) -> usize {
        self.store.lock().unwrap().sessions.len()
    }

    /// Raw file rows including soft-deleted ones: `(id, deleted)`.
    pub fn file_rows(&self) -> Vec<(i64, bool)> {
        let store = self.store.lock().unwrap();
        store.files.iter().map(|f| (f.row.id, f.deleted)).collect()
    }
}

#[async_trait]
impl StorageGateway for MemoryGateway {
    async fn acquire(&self) -> Result<Box<dyn StorageScope>, DatabaseError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        let work = self.store.lock().unwrap().clone();
        self.open_scopes.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryScope {
            shared: Arc::clone(&self.store),
            open_scopes: Arc::clone(&self.open_scopes),
            commits: Arc::clone(&self.commits),
            work,
        }))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DatabaseError::Sqlx(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

pub struct MemoryScope {
    shared: Arc<Mutex<Store>>,
    open_scopes: Arc<AtomicUsize>,
    commits: Arc<AtomicUsize>,
    work: Store,
}

impl Drop for MemoryScope {
    fn drop(&mut self) {
        self.open_scopes.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageScope for MemoryScope {
    async fn email_taken(&mut self, email: &str) -> Result<bool, DatabaseError> {
        Ok(self.work.users.iter().any(|u| u.profile.email == email))
    }

    async fn insert_user(
        &mut self,
        email: &str,
        password_hash: &str,
        language: &str,
    ) -> Result<UserProfile, DatabaseError> {
        if self.work.users.iter().any(|u| u.profile.email == email) {
            return Err(DatabaseError::Conflict("User already exists".to_string()));
        }
        let profile = UserProfile {
            id: self.work.next_id(),
            email: email.to_string(),
            language: language.to_string(),
            theme: "dark".to_string(),
            two_fa_enabled: false,
            analytics_enabled: true,
            action_logging_enabled: true,
        };
        self.work.users.push(UserRow {
            profile: profile.clone(),
            password_hash: password_hash.to_string(),
            two_fa_secret: None,
        });
        Ok(profile)
    }

    async fn find_login(&mut self, email: &str) -> Result<Option<LoginRecord>, DatabaseError> {
        Ok(self.work.users.iter().find(|u| u.profile.email == email).map(|u| LoginRecord {
            id: u.profile.id,
            password_hash: u.password_hash.clone(),
        }))
    }

    async fn find_user(&mut self, user_id: i64) -> Result<Option<UserProfile>, DatabaseError> {
        Ok(self
            .work
            .users
            .iter()
            .find(|u| u.profile.id == user_id)
            .map(|u| u.profile.clone()))
    }

    async fn update_user(&mut self, user_id: i64, patch: &Patch) -> Result<Option<UserProfile>, DatabaseError> {
        let Some(user) = self.work.users.iter_mut().find(|u| u.profile.id == user_id) else {
            return Ok(None);
        };
        for assignment in patch.assignments() {
            let value = &assignment.value;
            match assignment.column {
                "language" => user.profile.language = text(value),
                "theme" => user.profile.theme = text(value),
                "analytics_enabled" => user.profile.analytics_enabled = flag(value),
                "action_logging_enabled" => user.profile.action_logging_enabled = flag(value),
                other => panic!("unexpected users column {}", other),
            }
        }
        Ok(Some(user.profile.clone()))
    }

    async fn enable_two_factor(&mut self, user_id: i64, secret: &str) -> Result<(), DatabaseError> {
        if let Some(user) = self.work.users.iter_mut().find(|u| u.profile.id == user_id) {
            user.two_fa_secret = Some(secret.to_string());
            user.profile.two_fa_enabled = true;
        }
        Ok(())
    }

    async fn two_factor_secret(&mut self, user_id: i64) -> Result<Option<String>, DatabaseError> {
        Ok(self
            .work
            .users
            .iter()
            .find(|u| u.profile.id == user_id && u.profile.two_fa_enabled)
            .and_then(|u| u.two_fa_secret.clone()))
    }

    async fn insert_session(
        &mut self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        if self.work.sessions.iter().any(|s| s.token == token) {
            return Err(DatabaseError::Conflict("Session token collision".to_string()));
        }
        self.work.sessions.push(SessionRow {
            user_id,
            token: token.to_string(),
            expires_at,
        });
        Ok(())
    }

    async fn session_user(&mut self, token: &str, now: DateTime<Utc>) -> Result<Option<i64>, DatabaseError> {
        Ok(self
            .work
            .sessions
            .iter()
            .find(|s| s.token == token && s.expires_at > now)
            .map(|s| s.user_id))
    }

    async fn list_files(&mut self, user_id: i64) -> Result<Vec<FileRecord>, DatabaseError> {
        let mut files = live(&self.work.files, user_id);
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(files)
    }

    async fn insert_file(&mut self, user_id: i64, file: &NewFile) -> Result<FileRecord, DatabaseError> {
        let row = FileRecord {
            id: self.work.next_id(),
            name: file.name.clone(),
            size: file.size,
            file_type: file.file_type.clone(),
            storage_key: file.storage_key.clone(),
            created_at: self.work.now(),
        };
        self.work.files.push(Owned { user_id, row: row.clone(), deleted: false });
        Ok(row)
    }

    async fn find_file(&mut self, user_id: i64, file_id: i64) -> Result<Option<FileRecord>, DatabaseError> {
        Ok(live_mut(&mut self.work.files, user_id, |f| f.id == file_id).map(|f| f.row.clone()))
    }

    async fn delete_file(&mut self, user_id: i64, file_id: i64) -> Result<bool, DatabaseError> {
        Ok(live_mut(&mut self.work.files, user_id, |f| f.id == file_id)
            .map(|f| f.deleted = true)
            .is_some())
    }

    async fn list_games(&mut self, user_id: i64) -> Result<Vec<Game>, DatabaseError> {
        let mut games = live(&self.work.games, user_id);
        games.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(games)
    }

    async fn insert_game(&mut self, user_id: i64, game: &NewGame) -> Result<Game, DatabaseError> {
        let now = self.work.now();
        let row = Game {
            id: self.work.next_id(),
            name: game.name.clone(),
            hours: game.hours,
            status: game.status.clone(),
            created_at: now,
            updated_at: now,
        };
        self.work.games.push(Owned { user_id, row: row.clone(), deleted: false });
        Ok(row)
    }

    async fn update_game(&mut self, user_id: i64, game_id: i64, patch: &Patch) -> Result<Option<Game>, DatabaseError> {
        let now = self.work.now();
        let Some(game) = live_mut(&mut self.work.games, user_id, |g| g.id == game_id) else {
            return Ok(None);
        };
        for assignment in patch.assignments() {
            let value = &assignment.value;
            match assignment.column {
                "name" => game.row.name = text(value),
                "hours" => game.row.hours = number(value),
                "status" => game.row.status = text(value),
                other => panic!("unexpected games column {}", other),
            }
        }
        if patch.touched().contains(&"updated_at") {
            game.row.updated_at = now;
        }
        Ok(Some(game.row.clone()))
    }

    async fn delete_game(&mut self, user_id: i64, game_id: i64) -> Result<bool, DatabaseError> {
        Ok(live_mut(&mut self.work.games, user_id, |g| g.id == game_id)
            .map(|g| g.deleted = true)
            .is_some())
    }

    async fn list_platforms(&mut self, user_id: i64) -> Result<Vec<StreamingPlatform>, DatabaseError> {
        let mut platforms = live(&self.work.platforms, user_id);
        platforms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(platforms)
    }

    async fn insert_platform(
        &mut self,
        user_id: i64,
        platform: &NewPlatform,
    ) -> Result<StreamingPlatform, DatabaseError> {
        let row = StreamingPlatform {
            id: self.work.next_id(),
            name: platform.name.clone(),
            icon: platform.icon.clone(),
            color: platform.color.clone(),
            status: "active".to_string(),
            created_at: self.work.now(),
        };
        self.work.platforms.push(Owned { user_id, row: row.clone(), deleted: false });
        Ok(row)
    }

    async fn update_platform(
        &mut self,
        user_id: i64,
        platform_id: i64,
        patch: &Patch,
    ) -> Result<Option<StreamingPlatform>, DatabaseError> {
        let Some(platform) = live_mut(&mut self.work.platforms, user_id, |p| p.id == platform_id) else {
            return Ok(None);
        };
        for assignment in patch.assignments() {
            let value = &assignment.value;
            match assignment.column {
                "name" => platform.row.name = text(value),
                "icon" => platform.row.icon = text(value),
                "color" => platform.row.color = text(value),
                "status" => platform.row.status = text(value),
                other => panic!("unexpected streaming_platforms column {}", other),
            }
        }
        Ok(Some(platform.row.clone()))
    }

    async fn delete_platform(&mut self, user_id: i64, platform_id: i64) -> Result<bool, DatabaseError> {
        Ok(live_mut(&mut self.work.platforms, user_id, |p| p.id == platform_id)
            .map(|p| p.deleted = true)
            .is_some())
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        let mut shared = self.shared.lock().unwrap();
        *shared = self.work.clone();
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Handlers wired to a fresh in-memory store.
pub struct TestApp {
    pub gateway: Arc<MemoryGateway>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        let gateway = MemoryGateway::new();
        let state = AppState::new(gateway.clone(), SessionAuthenticator::new(Duration::days(7), 1));
        Self { gateway, state }
    }

    pub async fn auth(&self, request: HandlerRequest) -> Envelope {
        handlers::auth::handle(&self.state, request).await
    }

    pub async fn files(&self, request: HandlerRequest) -> Envelope {
        handlers::files::handle(&self.state, request).await
    }

    pub async fn games(&self, request: HandlerRequest) -> Envelope {
        handlers::games::handle(&self.state, request).await
    }

    pub async fn platforms(&self, request: HandlerRequest) -> Envelope {
        handlers::platforms::handle(&self.state, request).await
    }

    /// Register `email` and return its session token.
    pub async fn register(&self, email: &str) -> Result<String> {
        let envelope = self
            .auth(post(json!({"action": "register", "email": email, "password": "correct horse"})))
            .await;
        anyhow::ensure!(envelope.status_code == 201, "register failed: {}", envelope.body);
        token_of(&envelope)
    }
}

pub fn token_of(envelope: &Envelope) -> Result<String> {
    envelope.json_body()["session_token"]
        .as_str()
        .map(str::to_string)
        .context("response carried no session_token")
}

pub fn request(method: &str, token: Option<&str>, body: Option<Value>) -> HandlerRequest {
    let mut request = HandlerRequest::new(method);
    if let Some(token) = token {
        request = request.with_header("x-session-token", token);
    }
    if let Some(body) = body {
        request = request.with_body(body.to_string());
    }
    request
}

pub fn post(body: Value) -> HandlerRequest {
    request("POST", None, Some(body))
}

pub fn get(token: &str) -> HandlerRequest {
    request("GET", Some(token), None)
}

pub fn post_as(token: &str, body: Value) -> HandlerRequest {
    request("POST", Some(token), Some(body))
}

pub fn put_as(token: &str, body: Value) -> HandlerRequest {
    request("PUT", Some(token), Some(body))
}

pub fn delete_as(token: &str, body: Value) -> HandlerRequest {
    request("DELETE", Some(token), Some(body))
}

pub fn error_of(envelope: &Envelope) -> String {
    envelope.json_body()["error"].as_str().unwrap_or_default().to_string()
}
