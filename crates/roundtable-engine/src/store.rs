//! The persistence port the engine drives.
//!
//! Defined here so the store crate can implement it without the engine
//! depending on any database machinery. Methods are expressed in the
//! desugared `impl Future` form so implementations stay object-free and
//! the returned futures are `Send`.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::EngineError;

/// A snapshot row: the version column plus the state payload.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedState {
    pub version: i32,
    pub state: Value,
}

/// Game-status transition to apply atomically with a snapshot write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// waiting → in_progress (start_game bootstrap).
    Started,
    /// in_progress → finished; stamps `ended_at`.
    Finished { ended_at: DateTime<Utc> },
}

/// Transactional access the engine needs. One implementation lives in
/// the store crate; tests use an in-memory double.
pub trait GameStateStore: Send + Sync {
    /// The latest snapshot for the game, or `None` before the first
    /// write.
    fn latest_snapshot(
        &self,
        game_id: Uuid,
    ) -> impl Future<Output = Result<Option<VersionedState>, EngineError>> + Send;

    /// Room-player ids for the game in join order; fixes seating.
    fn player_ids_in_join_order(
        &self,
        game_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Uuid>, EngineError>> + Send;

    /// Appends the move event and the next snapshot (version = max + 1)
    /// in one transaction, applying `status_change` to the game row in
    /// the same transaction when present. Returns the new version.
    fn append_event_and_snapshot(
        &self,
        game_id: Uuid,
        actor: Option<Uuid>,
        move_type: &str,
        payload: Value,
        next_state: Value,
        status_change: Option<StatusChange>,
    ) -> impl Future<Output = Result<i32, EngineError>> + Send;
}
