// handlers/games.rs - /games handler

use serde_json::json;

use crate::api::{Envelope, HandlerRequest, Method, Reply};
use crate::database::models::NewGame;
use crate::database::{Patch, PatchField};
use crate::error::ApiError;
use crate::handlers::{finish, preflight, AppState};

const ALLOWED: &[Method] = &[Method::Get, Method::Post, Method::Put, Method::Delete];

const GAME_FIELDS: &[PatchField] = &[
    PatchField::text("name"),
    PatchField::number("hours"),
    PatchField::text("status"),
];

pub async fn handle(state: &AppState, request: HandlerRequest) -> Envelope {
    if let Some(envelope) = preflight("games", &request, ALLOWED) {
        return envelope;
    }
    dispatch(state, &request).await.into()
}

async fn dispatch(state: &AppState, request: &HandlerRequest) -> Result<Reply, ApiError> {
    let (mut scope, user_id) = state.authenticated(request).await?;

    let reply = match request.method() {
        Method::Get => {
            let games = scope.list_games(user_id).await?;
            Reply::ok(json!({ "games": games }))
        }
        Method::Post => {
            let body = request.json_body()?;
            let name = body
                .text("name")
                .ok_or_else(|| ApiError::bad_request("Game name required"))?;
            let new_game = NewGame {
                name: name.to_string(),
                hours: body.number_or("hours", 0.0)?,
                status: body.text_or("status", "playing")?.to_string(),
            };
            let game = scope.insert_game(user_id, &new_game).await?;
            Reply::created(json!({ "game": game }))
        }
        Method::Put => {
            let body = request.json_body()?;
            let game_id = body
                .id("id")
                .ok_or_else(|| ApiError::bad_request("Game ID required"))?;
            let patch = Patch::from_body(body.as_map(), GAME_FIELDS)?.touch("updated_at");
            let game = scope
                .update_game(user_id, game_id, &patch)
                .await?
                .ok_or_else(not_found)?;
            Reply::ok(json!({ "game": game }))
        }
        Method::Delete => {
            let body = request.json_body()?;
            let game_id = body
                .id("id")
                .ok_or_else(|| ApiError::bad_request("Game ID required"))?;
            if !scope.delete_game(user_id, game_id).await? {
                return Err(not_found());
            }
            Reply::ok(json!({ "message": "Game deleted" }))
        }
        _ => return Err(ApiError::MethodNotAllowed),
    };

    finish(scope, reply).await
}

fn not_found() -> ApiError {
    ApiError::not_found("Game not found")
}
