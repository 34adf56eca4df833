//! Room creation, joining, and the public room view.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use roundtable_store::{JoinedRoom, Room, RoomOverview, RoomPlayer, User};
use roundtable_token::default_room_ttl;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::validate::{valid_room_code, validate_room_password};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub settings: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub room: Room,
    pub room_player: RoomPlayer,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinRoomRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JoinRoomResponse {
    #[serde(flatten)]
    pub joined: JoinedRoom,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// `POST /rooms` — the authenticated user becomes the host; their
/// profile name is the host's display name.
pub async fn create_room(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<CreateRoomResponse>), ApiError> {
    if let Some(password) = &req.password {
        if let Some(msg) = validate_room_password(password) {
            return Err(ApiError::Validation(msg));
        }
    }

    let host = current_user(&state, claims.user_id).await?;
    let created = state
        .rooms
        .create_room(
            host.id,
            &host.display_name,
            req.password.as_deref(),
            req.settings.unwrap_or_else(|| json!({})),
        )
        .await?;

    let (token, expires_at) = state.tokens.generate_room_token(
        created.room.id,
        created.room_player.id,
        default_room_ttl(),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(CreateRoomResponse {
            room: created.room,
            room_player: created.room_player,
            token,
            expires_at,
        }),
    ))
}

/// `POST /rooms/{code}/join`
pub async fn join_room(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(code): Path<String>,
    Json(req): Json<JoinRoomRequest>,
) -> Result<Json<JoinRoomResponse>, ApiError> {
    if !valid_room_code(&code) {
        return Err(ApiError::Validation("invalid room code format".to_string()));
    }

    let user = current_user(&state, claims.user_id).await?;
    let joined = state
        .rooms
        .join_room(&code, user.id, &user.display_name, req.password.as_deref())
        .await?;

    let (token, expires_at) = state.tokens.generate_room_token(
        joined.room.id,
        joined.room_player.id,
        default_room_ttl(),
    )?;

    Ok(Json(JoinRoomResponse {
        joined,
        token,
        expires_at,
    }))
}

/// `GET /rooms/{code}` — public: room, latest game, latest snapshot.
pub async fn get_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<RoomOverview>, ApiError> {
    if !valid_room_code(&code) {
        return Err(ApiError::Validation("invalid room code format".to_string()));
    }
    let overview = state.rooms.get_room(&code).await?;
    Ok(Json(overview))
}

async fn current_user(state: &AppState, user_id: uuid::Uuid) -> Result<User, ApiError> {
    state
        .users
        .get_user_by_id(user_id)
        .await?
        .ok_or(ApiError::Unauthorized("unauthorized"))
}
