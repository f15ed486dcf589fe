// handlers/mod.rs - one handler per resource
//
// Every handler follows the same dispatch:
// OPTIONS → pre-flight (no storage touched)
// other verbs → acquire scope → authenticate → operate → commit
// unsupported verb from an authenticated caller → 405
//
// /auth is public, so it rejects unsupported verbs before touching storage.

use std::sync::Arc;

use tracing::debug;

use crate::api::{Envelope, HandlerRequest, Method};
use crate::auth::SessionAuthenticator;
use crate::database::{StorageGateway, StorageScope};
use crate::error::ApiError;

pub mod auth;
pub mod files;
pub mod games;
pub mod platforms;

/// Shared, request-independent collaborators.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn StorageGateway>,
    pub sessions: SessionAuthenticator,
}

impl AppState {
    pub fn new(gateway: Arc<dyn StorageGateway>, sessions: SessionAuthenticator) -> Self {
        Self { gateway, sessions }
    }

    /// Open the per-request unit of work.
    pub async fn scope(&self) -> Result<Box<dyn StorageScope>, ApiError> {
        Ok(self.gateway.acquire().await?)
    }

    /// Acquire a scope and resolve the caller's session in it.
    pub async fn authenticated(
        &self,
        request: &HandlerRequest,
    ) -> Result<(Box<dyn StorageScope>, i64), ApiError> {
        let mut scope = self.scope().await?;
        let user_id = self
            .sessions
            .resolve(scope.as_mut(), request.session_token())
            .await?;
        Ok((scope, user_id))
    }
}

/// CORS pre-flight short-circuit; `Some` is the terminal envelope.
pub(crate) fn preflight(handler: &str, request: &HandlerRequest, allowed: &[Method]) -> Option<Envelope> {
    let method = request.method();
    debug!("{} {}", method, handler);
    (method == Method::Options).then(|| Envelope::preflight(allowed))
}

/// Pre-flight plus an unauthenticated 405 for handlers without a session.
pub(crate) fn gate(handler: &str, request: &HandlerRequest, allowed: &[Method]) -> Result<Method, Envelope> {
    if let Some(envelope) = preflight(handler, request, allowed) {
        return Err(envelope);
    }
    match request.method() {
        m if allowed.contains(&m) => Ok(m),
        _ => Err(Envelope::error(&ApiError::MethodNotAllowed)),
    }
}

/// Commit and hand back the reply.
pub(crate) async fn finish<T>(scope: Box<dyn StorageScope>, value: T) -> Result<T, ApiError> {
    scope.commit().await?;
    Ok(value)
}
