//! Room WebSocket upgrade: token auth happens before the upgrade.

use std::net::SocketAddr;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use roundtable_hub::{run_session, SessionContext};
use roundtable_protocol::MAX_MESSAGE_BYTES;
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{bearer_token, client_ip};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// `GET /ws/rooms/{code}` — the room token arrives via `?token=` or a
/// Bearer header. Every check fails with 401 before upgrading.
pub async fn room_ws(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = query
        .token
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(&headers))
        .ok_or(ApiError::Unauthorized("missing or invalid token"))?;

    let claims = state.tokens.verify_room_token(&token).map_err(|e| {
        tracing::debug!(code = %code, error = %e, "room token rejected");
        ApiError::Unauthorized("unauthorized")
    })?;

    let room = state.rooms.get_room_by_code(&code).await?;
    if room.id != claims.room_id {
        return Err(ApiError::Unauthorized("room does not match token"));
    }

    let player = state
        .rooms
        .get_room_player_in_room(&code, claims.room_player_id)
        .await
        .map_err(|_| ApiError::Unauthorized("player not in room"))?;

    let ctx = SessionContext::new(
        room.id,
        player.id,
        player.display_name,
        client_ip(&headers, Some(peer)),
    );
    let hub = state.hub.clone();
    let router = state.move_router.clone();

    tracing::info!(
        room_id = %room.id,
        room_player_id = %ctx.room_player_id,
        "room socket accepted"
    );
    Ok(ws
        .max_message_size(MAX_MESSAGE_BYTES)
        .on_upgrade(move |socket| run_session(socket, ctx, hub, router)))
}
