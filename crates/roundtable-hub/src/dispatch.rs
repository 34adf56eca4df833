//! Routing of inbound room-socket messages.
//!
//! Chat is handled here; votes and actions go through the engine, and
//! their results fan out through the hub only after the move has been
//! persisted. Errors of any kind reach the sender alone.

use std::sync::Arc;

use roundtable_engine::Engine;
use roundtable_protocol::{client, ClientMessage, ServerEnvelope, MAX_CHAT_LEN};
use roundtable_ratelimit::Limiter;
use roundtable_store::{GameStore, RoomStore};
use serde_json::{json, Value};

use crate::hub::HubHandle;
use crate::session::SessionContext;

/// Routes decoded client messages to chat, engine, or state sync.
pub struct MoveRouter {
    hub: HubHandle,
    rooms: RoomStore,
    games: GameStore,
    engine: Engine<GameStore>,
    limiter: Arc<dyn Limiter>,
}

impl MoveRouter {
    pub fn new(
        hub: HubHandle,
        rooms: RoomStore,
        games: GameStore,
        engine: Engine<GameStore>,
        limiter: Arc<dyn Limiter>,
    ) -> Self {
        Self {
            hub,
            rooms,
            games,
            engine,
            limiter,
        }
    }

    pub async fn route(&self, ctx: &SessionContext, msg: ClientMessage) {
        match msg.kind.as_str() {
            client::CHAT => self.handle_chat(ctx, msg).await,
            client::SYNC_STATE => self.handle_sync_state(ctx).await,
            client::VOTE | client::ACTION => self.handle_move(ctx, msg).await,
            _ => {
                self.error_to(ctx, "unsupported message type").await;
            }
        }
    }

    /// Chat: rate-limited, truncated, persisted, then fanned out to
    /// everyone but the sender (clients echo optimistically).
    async fn handle_chat(&self, ctx: &SessionContext, msg: ClientMessage) {
        let decision = self.limiter.allow(&ctx.rate_limit_key);
        if !decision.allowed {
            self.error_to(ctx, "rate limit exceeded; try again later")
                .await;
            return;
        }

        let body = msg
            .payload
            .as_ref()
            .and_then(|p| p.get("message"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let body: String = body.chars().take(MAX_CHAT_LEN).collect();
        if body.is_empty() {
            return;
        }

        // Best-effort persistence; the broadcast goes out regardless.
        if let Err(e) = self
            .rooms
            .append_chat_message(ctx.room_id, None, ctx.room_player_id, &body)
            .await
        {
            tracing::warn!(
                room_id = %ctx.room_id,
                error = %e,
                "failed to persist chat message"
            );
        }

        let envelope = ServerEnvelope::event(
            roundtable_protocol::event::CHAT,
            json!({
                "display_name": ctx.display_name,
                "message": body,
            }),
        );
        self.hub
            .broadcast_except(ctx.room_id, envelope, ctx.session_id)
            .await;
    }

    /// Replies to this session only with the latest game state.
    async fn handle_sync_state(&self, ctx: &SessionContext) {
        let game = match self.games.latest_game(ctx.room_id).await {
            Ok(Some(game)) => game,
            Ok(None) => {
                self.error_to(ctx, "no game found for room").await;
                return;
            }
            Err(e) => {
                tracing::error!(room_id = %ctx.room_id, error = %e, "sync_state lookup failed");
                self.error_to(ctx, "failed to load state").await;
                return;
            }
        };

        let payload = match self.engine.latest_state(game.id).await {
            Ok(Some(state)) => {
                let phase = state.phase;
                let version = state.version;
                match serde_json::to_value(&state) {
                    Ok(state_json) => json!({
                        "game_id": game.id,
                        "state": state_json,
                        "phase": phase,
                        "version": version,
                    }),
                    Err(e) => {
                        tracing::error!(game_id = %game.id, error = %e, "state encode failed");
                        self.error_to(ctx, "failed to load state").await;
                        return;
                    }
                }
            }
            Ok(None) => json!({
                "game_id": game.id,
                "state": { "phase": "lobby" },
            }),
            Err(e) => {
                tracing::error!(game_id = %game.id, error = %e, "failed to load state");
                self.error_to(ctx, "failed to load state").await;
                return;
            }
        };

        self.hub
            .send_to(ctx.room_id, ctx.session_id, ServerEnvelope::state(payload))
            .await;
    }

    /// Votes and actions: resolve the room's latest game, apply the
    /// move, then broadcast the engine's events and the new state.
    async fn handle_move(&self, ctx: &SessionContext, msg: ClientMessage) {
        let game = match self.games.latest_game(ctx.room_id).await {
            Ok(Some(game)) => game,
            Ok(None) => {
                self.error_to(ctx, "no game found for room").await;
                return;
            }
            Err(e) => {
                tracing::error!(room_id = %ctx.room_id, error = %e, "game lookup failed");
                self.error_to(ctx, "internal error").await;
                return;
            }
        };

        let payload = msg.payload.unwrap_or_else(|| json!({}));
        let outcome = match self
            .engine
            .apply_move(game.id, ctx.room_player_id, &msg.kind, payload)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) if e.is_rules_violation() => {
                // The sender alone learns why; nothing is broadcast.
                self.error_to(ctx, &e.to_string()).await;
                return;
            }
            Err(e) => {
                tracing::error!(game_id = %game.id, error = %e, "move persistence failed");
                self.error_to(ctx, "internal error").await;
                return;
            }
        };

        for event in &outcome.events {
            self.hub
                .broadcast(
                    ctx.room_id,
                    ServerEnvelope::event(&event.name, event.payload.clone()),
                )
                .await;
        }

        let state = &outcome.state;
        match serde_json::to_value(state) {
            Ok(state_json) => {
                let envelope = ServerEnvelope::state(json!({
                    "game_id": game.id,
                    "state": state_json,
                    "phase": state.phase,
                    "version": state.version,
                }));
                self.hub.broadcast(ctx.room_id, envelope).await;
            }
            Err(e) => {
                tracing::error!(game_id = %game.id, error = %e, "state encode failed");
            }
        }
    }

    async fn error_to(&self, ctx: &SessionContext, message: &str) {
        self.hub
            .send_to(ctx.room_id, ctx.session_id, ServerEnvelope::error(message))
            .await;
    }
}
