// handlers/files.rs - /files handler
//
// GET            → list caller's files
// GET ?id=N      → one file plus its download link
// POST           → record uploaded file metadata
// DELETE {id}    → soft delete

use serde_json::{json, Value};

use crate::api::request::parse_id;
use crate::api::{Envelope, HandlerRequest, Method, Reply};
use crate::database::models::NewFile;
use crate::error::ApiError;
use crate::handlers::{finish, preflight, AppState};

const ALLOWED: &[Method] = &[Method::Get, Method::Post, Method::Delete];

const DEFAULT_FILE_TYPE: &str = "unknown";

pub async fn handle(state: &AppState, request: HandlerRequest) -> Envelope {
    if let Some(envelope) = preflight("files", &request, ALLOWED) {
        return envelope;
    }
    dispatch(state, &request).await.into()
}

async fn dispatch(state: &AppState, request: &HandlerRequest) -> Result<Reply, ApiError> {
    let (mut scope, user_id) = state.authenticated(request).await?;

    let reply = match request.method() {
        Method::Get => match request.query("id") {
            None => {
                let files = scope.list_files(user_id).await?;
                Reply::ok(json!({ "files": files }))
            }
            Some(raw) => {
                let file_id = parse_id(raw).ok_or_else(not_found)?;
                let file = scope.find_file(user_id, file_id).await?.ok_or_else(not_found)?;
                let url = download_url(file.id);
                Reply::ok(json!({ "file": file, "downloadUrl": url }))
            }
        },
        Method::Post => {
            let body = request.json_body()?;
            let name = body.text("name");
            let size = body.get("size").filter(|v| !v.is_null());
            let (name, size) = match (name, size) {
                (Some(name), Some(size)) => (name, size),
                _ => return Err(ApiError::bad_request("File name and size required")),
            };
            let size = size
                .as_i64()
                .filter(|size| *size >= 0)
                .ok_or_else(|| ApiError::bad_request("Invalid value for field 'size'"))?;
            let file_type = body.text_or("type", DEFAULT_FILE_TYPE)?;

            // `content` is accepted for compatibility; bytes are never stored here.
            let new_file = NewFile {
                name: name.to_string(),
                size,
                file_type: file_type.to_string(),
                storage_key: NewFile::storage_key_for(user_id, name),
            };
            let file = scope.insert_file(user_id, &new_file).await?;
            Reply::created(json!({ "file": file }))
        }
        Method::Delete => {
            let body = request.json_body()?;
            let file_id = body
                .id("id")
                .ok_or_else(|| ApiError::bad_request("File ID required"))?;
            if !scope.delete_file(user_id, file_id).await? {
                return Err(not_found());
            }
            Reply::ok(json!({ "message": "File deleted" }))
        }
        _ => return Err(ApiError::MethodNotAllowed),
    };

    finish(scope, reply).await
}

fn not_found() -> ApiError {
    ApiError::not_found("File not found")
}

pub fn download_url(file_id: i64) -> Value {
    Value::String(format!("/api/files?id={}", file_id))
}
