// handlers/auth.rs - /auth handler
//
// POST routes on the `action` body field (default `login`):
//   register | login | verify_session | enable_2fa | verify_2fa
// GET  → verify_session
// PUT  → settings update

use serde_json::json;
use tracing::debug;

use crate::api::{Envelope, HandlerRequest, JsonBody, Method, Reply};
use crate::database::{Patch, PatchField};
use crate::error::ApiError;
use crate::handlers::{finish, gate, AppState};

const ALLOWED: &[Method] = &[Method::Get, Method::Post, Method::Put];

const DEFAULT_LANGUAGE: &str = "ru";

/// Columns a user may change through the settings update.
const SETTINGS_FIELDS: &[PatchField] = &[
    PatchField::text("language"),
    PatchField::text("theme"),
    PatchField::flag("analytics_enabled"),
    PatchField::flag("action_logging_enabled"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Register,
    Login,
    VerifySession,
    EnableTwoFactor,
    VerifyTwoFactor,
}

impl Action {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "register" => Some(Action::Register),
            "login" => Some(Action::Login),
            "verify_session" => Some(Action::VerifySession),
            "enable_2fa" => Some(Action::EnableTwoFactor),
            "verify_2fa" => Some(Action::VerifyTwoFactor),
            _ => None,
        }
    }
}

pub async fn handle(state: &AppState, request: HandlerRequest) -> Envelope {
    let method = match gate("auth", &request, ALLOWED) {
        Ok(method) => method,
        Err(envelope) => return envelope,
    };
    dispatch(state, method, &request).await.into()
}

async fn dispatch(state: &AppState, method: Method, request: &HandlerRequest) -> Result<Reply, ApiError> {
    match method {
        Method::Get => verify_session(state, request).await,
        Method::Put => update_settings(state, request).await,
        _ => {
            let body = request.json_body()?;
            let action = match body.get("action") {
                None => Action::Login,
                Some(raw) => raw
                    .as_str()
                    .and_then(Action::parse)
                    .ok_or_else(|| ApiError::bad_request("Unknown action"))?,
            };
            debug!("auth action {:?}", action);

            match action {
                Action::Register => register(state, &body).await,
                Action::Login => login(state, &body).await,
                Action::VerifySession => verify_session(state, request).await,
                Action::EnableTwoFactor => enable_two_factor(state, request).await,
                Action::VerifyTwoFactor => verify_two_factor(state, request, &body).await,
            }
        }
    }
}

fn credentials(body: &JsonBody) -> Result<(&str, &str), ApiError> {
    match (body.text("email"), body.text("password")) {
        (Some(email), Some(password)) => Ok((email, password)),
        _ => Err(ApiError::bad_request("Email and password required")),
    }
}

async fn register(state: &AppState, body: &JsonBody) -> Result<Reply, ApiError> {
    let (email, password) = credentials(body)?;
    let language = body.text_or("language", DEFAULT_LANGUAGE)?;

    let mut scope = state.scope().await?;
    let (user, token) = state
        .sessions
        .register(scope.as_mut(), email, password, language)
        .await?;

    finish(scope, Reply::created(json!({ "user": user, "session_token": token }))).await
}

async fn login(state: &AppState, body: &JsonBody) -> Result<Reply, ApiError> {
    let (email, password) = credentials(body)?;

    let mut scope = state.scope().await?;
    let (user, token) = state.sessions.login(scope.as_mut(), email, password).await?;

    finish(scope, Reply::ok(json!({ "user": user, "session_token": token }))).await
}

async fn verify_session(state: &AppState, request: &HandlerRequest) -> Result<Reply, ApiError> {
    let (mut scope, user_id) = state.authenticated(request).await?;
    let user = scope
        .find_user(user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    finish(scope, Reply::ok(json!({ "user": user }))).await
}

async fn enable_two_factor(state: &AppState, request: &HandlerRequest) -> Result<Reply, ApiError> {
    let (mut scope, user_id) = state.authenticated(request).await?;
    let secret = state.sessions.enable_two_factor(scope.as_mut(), user_id).await?;

    finish(scope, Reply::ok(json!({ "secret": secret, "message": "2FA enabled" }))).await
}

async fn verify_two_factor(state: &AppState, request: &HandlerRequest, body: &JsonBody) -> Result<Reply, ApiError> {
    let (mut scope, user_id) = state.authenticated(request).await?;
    let code = body
        .text("code")
        .ok_or_else(|| ApiError::bad_request("Verification code required"))?;

    state
        .sessions
        .verify_two_factor(scope.as_mut(), user_id, code)
        .await?;

    finish(scope, Reply::ok(json!({ "verified": true }))).await
}

async fn update_settings(state: &AppState, request: &HandlerRequest) -> Result<Reply, ApiError> {
    let (mut scope, user_id) = state.authenticated(request).await?;
    let body = request.json_body()?;
    let patch = Patch::from_body(body.as_map(), SETTINGS_FIELDS)?;

    let user = scope
        .update_user(user_id, &patch)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;
    debug!("Updated settings for user {}", user_id);

    finish(scope, Reply::ok(json!({ "message": "Settings updated", "user": user }))).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_actions_only() {
        assert_eq!(Action::parse("register"), Some(Action::Register));
        assert_eq!(Action::parse("enable_2fa"), Some(Action::EnableTwoFactor));
        assert_eq!(Action::parse("verify_2fa"), Some(Action::VerifyTwoFactor));
        assert_eq!(Action::parse("Register"), None);
        assert_eq!(Action::parse("logout"), None);
    }

    #[test]
    fn requires_both_credentials() {
        let body = JsonBody::parse(Some(r#"{"email": "a@b.c"}"#)).unwrap();
        assert_eq!(
            credentials(&body).unwrap_err(),
            ApiError::bad_request("Email and password required")
        );

        let body = JsonBody::parse(Some(r#"{"email": "a@b.c", "password": ""}"#)).unwrap();
        assert!(credentials(&body).is_err());

        let body = JsonBody::parse(Some(r#"{"email": "a@b.c", "password": "pw"}"#)).unwrap();
        assert_eq!(credentials(&body).unwrap(), ("a@b.c", "pw"));
    }
}
