// handlers/platforms.rs - /platforms handler
// Streaming services the user follows, shown as tiles on the dashboard.

use serde_json::json;

use crate::api::{Envelope, HandlerRequest, Method, Reply};
use crate::database::models::NewPlatform;
use crate::database::{Patch, PatchField};
use crate::error::ApiError;
use crate::handlers::{finish, preflight, AppState};

const ALLOWED: &[Method] = &[Method::Get, Method::Post, Method::Put, Method::Delete];

const DEFAULT_ICON: &str = "Tv";
const DEFAULT_COLOR: &str = "bg-primary";

const PLATFORM_FIELDS: &[PatchField] = &[
    PatchField::text("name"),
    PatchField::text("icon"),
    PatchField::text("color"),
    PatchField::text("status"),
];

pub async fn handle(state: &AppState, request: HandlerRequest) -> Envelope {
    if let Some(envelope) = preflight("platforms", &request, ALLOWED) {
        return envelope;
    }
    dispatch(state, &request).await.into()
}

async fn dispatch(state: &AppState, request: &HandlerRequest) -> Result<Reply, ApiError> {
    let (mut scope, user_id) = state.authenticated(request).await?;

    let reply = match request.method() {
        Method::Get => {
            let platforms = scope.list_platforms(user_id).await?;
            Reply::ok(json!({ "platforms": platforms }))
        }
        Method::Post => {
            let body = request.json_body()?;
            let name = body
                .text("name")
                .ok_or_else(|| ApiError::bad_request("Platform name required"))?;
            let new_platform = NewPlatform {
                name: name.to_string(),
                icon: body.text_or("icon", DEFAULT_ICON)?.to_string(),
                color: body.text_or("color", DEFAULT_COLOR)?.to_string(),
            };
            let platform = scope.insert_platform(user_id, &new_platform).await?;
            Reply::created(json!({ "platform": platform }))
        }
        Method::Put => {
            let body = request.json_body()?;
            let platform_id = body
                .id("id")
                .ok_or_else(|| ApiError::bad_request("Platform ID required"))?;
            let patch = Patch::from_body(body.as_map(), PLATFORM_FIELDS)?;
            let platform = scope
                .update_platform(user_id, platform_id, &patch)
                .await?
                .ok_or_else(not_found)?;
            Reply::ok(json!({ "platform": platform }))
        }
        Method::Delete => {
            let body = request.json_body()?;
            let platform_id = body
                .id("id")
                .ok_or_else(|| ApiError::bad_request("Platform ID required"))?;
            if !scope.delete_platform(user_id, platform_id).await? {
                return Err(not_found());
            }
            Reply::ok(json!({ "message": "Platform deleted" }))
        }
        _ => return Err(ApiError::MethodNotAllowed),
    };

    finish(scope, reply).await
}

fn not_found() -> ApiError {
    ApiError::not_found("Platform not found")
}
