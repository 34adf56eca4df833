//! Starting a new game in a room (host only).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use roundtable_store::CreatedGame;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::validate::valid_room_code;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateGameRequest {
    #[serde(default)]
    pub config: Option<Value>,
}

/// `POST /rooms/{code}/games` — seats every current room player in a
/// fresh waiting game.
pub async fn create_game(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(code): Path<String>,
    Json(req): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<CreatedGame>), ApiError> {
    if !valid_room_code(&code) {
        return Err(ApiError::Validation("invalid room code format".to_string()));
    }

    let player = state
        .rooms
        .get_room_player_by_user_in_room(&code, claims.user_id)
        .await?;
    if !player.is_host {
        return Err(ApiError::Forbidden("only the host can create a game"));
    }

    let created = state
        .games
        .create_game(player.room_id, req.config.unwrap_or_else(|| json!({})))
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}
