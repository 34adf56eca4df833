//! Games: creation, snapshots, and the move-persistence transaction.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use roundtable_engine::{EngineError, GameStateStore, StatusChange, VersionedState};

use crate::error::StoreError;
use crate::models::{
    Game, GamePlayer, Snapshot, GAME_STATUS_FINISHED, GAME_STATUS_IN_PROGRESS,
    GAME_STATUS_WAITING,
};

pub(crate) const GAME_COLUMNS: &str =
    "id, room_id, status, config, created_at, ended_at";
const GAME_PLAYER_COLUMNS: &str =
    "id, game_id, room_player_id, role, joined_at, left_at";
const SNAPSHOT_COLUMNS: &str = "id, game_id, version, state, created_at";

/// The snapshot payload every game starts from.
pub(crate) fn lobby_state() -> Value {
    serde_json::json!({ "phase": "lobby" })
}

/// Result of creating a game: all current room players are seated.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedGame {
    pub game: Game,
    pub players: Vec<GamePlayer>,
    pub latest_snapshot: Value,
}

#[derive(Clone)]
pub struct GameStore {
    pool: PgPool,
}

impl GameStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a game in `waiting` status, seats every current room
    /// player, and writes the v1 lobby snapshot, all in one
    /// transaction.
    pub async fn create_game(
        &self,
        room_id: Uuid,
        config: Value,
    ) -> Result<CreatedGame, StoreError> {
        let mut tx = self.pool.begin().await?;

        let room_player_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM room_players WHERE room_id = $1 \
             ORDER BY created_at, id",
        )
        .bind(room_id)
        .fetch_all(&mut *tx)
        .await?;
        if room_player_ids.is_empty() {
            return Err(StoreError::RoomHasNoPlayers);
        }

        let game = sqlx::query_as::<_, Game>(&format!(
            "INSERT INTO games (room_id, status, config) \
             VALUES ($1, $2, $3) RETURNING {GAME_COLUMNS}"
        ))
        .bind(room_id)
        .bind(GAME_STATUS_WAITING)
        .bind(&config)
        .fetch_one(&mut *tx)
        .await?;

        let mut players = Vec::with_capacity(room_player_ids.len());
        for room_player_id in room_player_ids {
            let player = sqlx::query_as::<_, GamePlayer>(&format!(
                "INSERT INTO game_players (game_id, room_player_id) \
                 VALUES ($1, $2) RETURNING {GAME_PLAYER_COLUMNS}"
            ))
            .bind(game.id)
            .bind(room_player_id)
            .fetch_one(&mut *tx)
            .await?;
            players.push(player);
        }

        let latest_snapshot = lobby_state();
        sqlx::query(
            "INSERT INTO game_state_snapshots (game_id, version, state) \
             VALUES ($1, 1, $2)",
        )
        .bind(game.id)
        .bind(&latest_snapshot)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            game_id = %game.id,
            %room_id,
            players = players.len(),
            "game created"
        );
        Ok(CreatedGame {
            game,
            players,
            latest_snapshot,
        })
    }

    /// The most recently created game for the room, if any.
    pub async fn latest_game(&self, room_id: Uuid) -> Result<Option<Game>, StoreError> {
        let game = sqlx::query_as::<_, Game>(&format!(
            "SELECT {GAME_COLUMNS} FROM games WHERE room_id = $1 \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(game)
    }

    /// The latest snapshot row for a game, or `None` before any write.
    pub async fn latest_snapshot(
        &self,
        game_id: Uuid,
    ) -> Result<Option<Snapshot>, StoreError> {
        let snapshot = sqlx::query_as::<_, Snapshot>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM game_state_snapshots \
             WHERE game_id = $1 ORDER BY version DESC LIMIT 1"
        ))
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(snapshot)
    }

    /// Room-player ids seated in the game, in room join order.
    pub async fn player_ids_in_join_order(
        &self,
        game_id: Uuid,
    ) -> Result<Vec<Uuid>, StoreError> {
        let ids = sqlx::query_scalar(
            "SELECT gp.room_player_id FROM game_players gp \
             JOIN room_players rp ON rp.id = gp.room_player_id \
             WHERE gp.game_id = $1 ORDER BY rp.created_at, rp.id",
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Appends the move event and the next snapshot in one transaction,
    /// applying any status transition in the same transaction.
    ///
    /// Two concurrent moves can race on the (game_id, version) unique
    /// index; the loser re-reads the max version and retries once.
    pub async fn append_event_and_snapshot(
        &self,
        game_id: Uuid,
        actor: Option<Uuid>,
        move_type: &str,
        payload: &Value,
        next_state: &Value,
        status_change: Option<StatusChange>,
    ) -> Result<i32, StoreError> {
        match self
            .try_append(game_id, actor, move_type, payload, next_state, status_change)
            .await
        {
            Err(ref e) if e.is_unique_violation() => {
                tracing::debug!(%game_id, "snapshot version race, retrying");
                match self
                    .try_append(
                        game_id,
                        actor,
                        move_type,
                        payload,
                        next_state,
                        status_change,
                    )
                    .await
                {
                    Err(ref e) if e.is_unique_violation() => {
                        Err(StoreError::SnapshotConflict)
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn try_append(
        &self,
        game_id: Uuid,
        actor: Option<Uuid>,
        move_type: &str,
        payload: &Value,
        next_state: &Value,
        status_change: Option<StatusChange>,
    ) -> Result<i32, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO game_events (game_id, room_player_id, type, payload) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(game_id)
        .bind(actor)
        .bind(move_type)
        .bind(payload)
        .execute(&mut *tx)
        .await?;

        let version: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM game_state_snapshots \
             WHERE game_id = $1",
        )
        .bind(game_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO game_state_snapshots (game_id, version, state) \
             VALUES ($1, $2, $3)",
        )
        .bind(game_id)
        .bind(version)
        .bind(next_state)
        .execute(&mut *tx)
        .await?;

        if let Some(change) = status_change {
            apply_status_change(&mut *tx, game_id, change).await?;
        }

        tx.commit().await?;
        Ok(version)
    }

    /// Flips the game to finished and stamps `ended_at`.
    pub async fn mark_game_finished(
        &self,
        game_id: Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        apply_status_change(
            &self.pool,
            game_id,
            StatusChange::Finished { ended_at },
        )
        .await?;
        Ok(())
    }
}

async fn apply_status_change<'e>(
    executor: impl PgExecutor<'e>,
    game_id: Uuid,
    change: StatusChange,
) -> Result<(), sqlx::Error> {
    match change {
        StatusChange::Started => {
            sqlx::query("UPDATE games SET status = $2 WHERE id = $1")
                .bind(game_id)
                .bind(GAME_STATUS_IN_PROGRESS)
                .execute(executor)
                .await?;
        }
        StatusChange::Finished { ended_at } => {
            sqlx::query("UPDATE games SET status = $2, ended_at = $3 WHERE id = $1")
                .bind(game_id)
                .bind(GAME_STATUS_FINISHED)
                .bind(ended_at)
                .execute(executor)
                .await?;
        }
    }
    Ok(())
}

// -------------------------------------------------------------------------
// Engine port
// -------------------------------------------------------------------------

impl GameStateStore for GameStore {
    fn latest_snapshot(
        &self,
        game_id: Uuid,
    ) -> impl Future<Output = Result<Option<VersionedState>, EngineError>> + Send
    {
        async move {
            let snapshot = GameStore::latest_snapshot(self, game_id)
                .await
                .map_err(EngineError::store)?;
            Ok(snapshot.map(|s| VersionedState {
                version: s.version,
                state: s.state,
            }))
        }
    }

    fn player_ids_in_join_order(
        &self,
        game_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Uuid>, EngineError>> + Send {
        async move {
            GameStore::player_ids_in_join_order(self, game_id)
                .await
                .map_err(EngineError::store)
        }
    }

    fn append_event_and_snapshot(
        &self,
        game_id: Uuid,
        actor: Option<Uuid>,
        move_type: &str,
        payload: Value,
        next_state: Value,
        status_change: Option<StatusChange>,
    ) -> impl Future<Output = Result<i32, EngineError>> + Send {
        async move {
            GameStore::append_event_and_snapshot(
                self,
                game_id,
                actor,
                move_type,
                &payload,
                &next_state,
                status_change,
            )
            .await
            .map_err(EngineError::store)
        }
    }
}
