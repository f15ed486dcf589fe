// api/router.rs - axum front door for the transport-agnostic handlers

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, Method as HttpMethod, StatusCode, Uri},
    response::{IntoResponse, Json},
    routing::{any, get},
    Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::api::envelope::Envelope;
use crate::api::request::HandlerRequest;
use crate::error::ApiError;
use crate::handlers::{self, AppState};

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth", any(auth))
        .route("/files", any(files))
        .route("/games", any(games))
        .route("/platforms", any(platforms))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Collapse the HTTP pieces into the shape every handler accepts.
///
/// A malformed query string or a non-UTF-8 body becomes an enveloped 400.
fn to_request(method: &HttpMethod, uri: &Uri, headers: &HeaderMap, body: Bytes) -> Result<HandlerRequest, Envelope> {
    let Query(query) = Query::<HashMap<String, String>>::try_from_uri(uri).map_err(|e| {
        debug!("Rejected query string: {}", e);
        Envelope::error(&ApiError::bad_request("Invalid query string"))
    })?;
    let body = String::from_utf8(body.to_vec())
        .map_err(|_| Envelope::error(&ApiError::bad_request("Request body must be UTF-8")))?;

    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();

    Ok(HandlerRequest {
        http_method: method.as_str().to_string(),
        headers: Some(headers),
        body: (!body.is_empty()).then_some(body),
        query_string_parameters: (!query.is_empty()).then_some(query),
    })
}

async fn auth(State(state): State<AppState>, method: HttpMethod, uri: Uri, headers: HeaderMap, body: Bytes) -> Envelope {
    match to_request(&method, &uri, &headers, body) {
        Ok(request) => handlers::auth::handle(&state, request).await,
        Err(envelope) => envelope,
    }
}

async fn files(State(state): State<AppState>, method: HttpMethod, uri: Uri, headers: HeaderMap, body: Bytes) -> Envelope {
    match to_request(&method, &uri, &headers, body) {
        Ok(request) => handlers::files::handle(&state, request).await,
        Err(envelope) => envelope,
    }
}

async fn games(State(state): State<AppState>, method: HttpMethod, uri: Uri, headers: HeaderMap, body: Bytes) -> Envelope {
    match to_request(&method, &uri, &headers, body) {
        Ok(request) => handlers::games::handle(&state, request).await,
        Err(envelope) => envelope,
    }
}

async fn platforms(
    State(state): State<AppState>,
    method: HttpMethod,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Envelope {
    match to_request(&method, &uri, &headers, body) {
        Ok(request) => handlers::platforms::handle(&state, request).await,
        Err(envelope) => envelope,
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.gateway.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                })),
            )
        }
    }
}
