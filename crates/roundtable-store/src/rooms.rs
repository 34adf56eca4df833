//! Rooms: creation, joining, lookups, and chat persistence.

use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::games::{lobby_state, GAME_COLUMNS};
use crate::models::{
    ChatMessage, Game, GamePlayer, Room, RoomOverview, RoomPlayer,
    GAME_STATUS_WAITING,
};

pub(crate) const ROOM_COLUMNS: &str =
    "id, code, password_hash, settings, created_at, updated_at";
pub(crate) const ROOM_PLAYER_COLUMNS: &str =
    "id, room_id, user_id, display_name, is_host, created_at";

/// Confusable-free alphabet for join codes: no 0/O, no 1/I.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const ROOM_CODE_LEN: usize = 6;

fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| {
            let i = rng.random_range(0..ROOM_CODE_ALPHABET.len());
            ROOM_CODE_ALPHABET[i] as char
        })
        .collect()
}

/// Result of creating a room: the host identity and the initial
/// waiting game come with it.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedRoom {
    pub room: Room,
    pub room_player: RoomPlayer,
    pub game: Game,
}

/// Result of joining a room by code.
#[derive(Debug, Clone, Serialize)]
pub struct JoinedRoom {
    pub room: Room,
    pub room_player: RoomPlayer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_game: Option<Game>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_player: Option<GamePlayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_snapshot: Option<Value>,
}

#[derive(Clone)]
pub struct RoomStore {
    pool: PgPool,
}

impl RoomStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a room with its host player, an initial waiting game,
    /// and the v1 lobby snapshot, all in one transaction.
    pub async fn create_room(
        &self,
        host_user_id: Uuid,
        host_display_name: &str,
        password: Option<&str>,
        settings: Value,
    ) -> Result<CreatedRoom, StoreError> {
        // Codes collide rarely; regenerate until free.
        let code = loop {
            let candidate = generate_room_code();
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM rooms WHERE code = $1)",
            )
            .bind(&candidate)
            .fetch_one(&self.pool)
            .await?;
            if !exists {
                break candidate;
            }
        };

        let password_hash = match password {
            Some(p) if !p.is_empty() => {
                Some(bcrypt::hash(p, bcrypt::DEFAULT_COST)?)
            }
            _ => None,
        };

        let mut tx = self.pool.begin().await?;

        let room = sqlx::query_as::<_, Room>(&format!(
            "INSERT INTO rooms (code, password_hash, settings) \
             VALUES ($1, $2, $3) RETURNING {ROOM_COLUMNS}"
        ))
        .bind(&code)
        .bind(&password_hash)
        .bind(&settings)
        .fetch_one(&mut *tx)
        .await?;

        let room_player = sqlx::query_as::<_, RoomPlayer>(&format!(
            "INSERT INTO room_players (room_id, user_id, display_name, is_host) \
             VALUES ($1, $2, $3, TRUE) RETURNING {ROOM_PLAYER_COLUMNS}"
        ))
        .bind(room.id)
        .bind(host_user_id)
        .bind(host_display_name)
        .fetch_one(&mut *tx)
        .await?;

        let game = sqlx::query_as::<_, Game>(&format!(
            "INSERT INTO games (room_id, status, config) \
             VALUES ($1, $2, '{{}}') RETURNING {GAME_COLUMNS}"
        ))
        .bind(room.id)
        .bind(GAME_STATUS_WAITING)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO game_players (game_id, room_player_id) VALUES ($1, $2)",
        )
        .bind(game.id)
        .bind(room_player.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO game_state_snapshots (game_id, version, state) \
             VALUES ($1, 1, $2)",
        )
        .bind(game.id)
        .bind(lobby_state())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(room_id = %room.id, code = %room.code, "room created");
        Ok(CreatedRoom {
            room,
            room_player,
            game,
        })
    }

    /// Joins an existing room by code, adding the player to the latest
    /// game when one exists.
    pub async fn join_room(
        &self,
        code: &str,
        user_id: Uuid,
        display_name: &str,
        password: Option<&str>,
    ) -> Result<JoinedRoom, StoreError> {
        let room = self.get_room_by_code(code).await?;

        if let Some(hash) = &room.password_hash {
            let Some(password) = password.filter(|p| !p.is_empty()) else {
                return Err(StoreError::PasswordRequired);
            };
            if !bcrypt::verify(password, hash).unwrap_or(false) {
                return Err(StoreError::InvalidPassword);
            }
        }

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, RoomPlayer>(&format!(
            "INSERT INTO room_players (room_id, user_id, display_name, is_host) \
             VALUES ($1, $2, $3, FALSE) RETURNING {ROOM_PLAYER_COLUMNS}"
        ))
        .bind(room.id)
        .bind(user_id)
        .bind(display_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(StoreError::from);
        let room_player = match inserted {
            Err(ref e) if e.is_unique_violation() => {
                return Err(StoreError::NameTaken);
            }
            other => other?,
        };

        let latest_game = sqlx::query_as::<_, Game>(&format!(
            "SELECT {GAME_COLUMNS} FROM games WHERE room_id = $1 \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(room.id)
        .fetch_optional(&mut *tx)
        .await?;

        let mut game_player = None;
        if let Some(game) = &latest_game {
            game_player = Some(
                sqlx::query_as::<_, GamePlayer>(
                    "INSERT INTO game_players (game_id, room_player_id) \
                     VALUES ($1, $2) \
                     RETURNING id, game_id, room_player_id, role, joined_at, left_at",
                )
                .bind(game.id)
                .bind(room_player.id)
                .fetch_one(&mut *tx)
                .await?,
            );
        }

        tx.commit().await?;

        let latest_snapshot = match &latest_game {
            Some(game) => {
                sqlx::query_scalar::<_, Value>(
                    "SELECT state FROM game_state_snapshots WHERE game_id = $1 \
                     ORDER BY version DESC LIMIT 1",
                )
                .bind(game.id)
                .fetch_optional(&self.pool)
                .await?
            }
            None => None,
        };

        tracing::info!(
            room_id = %room.id,
            room_player_id = %room_player.id,
            "player joined room"
        );
        Ok(JoinedRoom {
            room,
            room_player,
            latest_game,
            game_player,
            latest_snapshot,
        })
    }

    pub async fn get_room_by_code(&self, code: &str) -> Result<Room, StoreError> {
        sqlx::query_as::<_, Room>(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::RoomNotFound)
    }

    /// Room plus latest game and snapshot, for the public room view.
    pub async fn get_room(&self, code: &str) -> Result<RoomOverview, StoreError> {
        let room = self.get_room_by_code(code).await?;

        let latest_game = sqlx::query_as::<_, Game>(&format!(
            "SELECT {GAME_COLUMNS} FROM games WHERE room_id = $1 \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(room.id)
        .fetch_optional(&self.pool)
        .await?;

        let latest_snapshot = match &latest_game {
            Some(game) => {
                sqlx::query_scalar::<_, Value>(
                    "SELECT state FROM game_state_snapshots WHERE game_id = $1 \
                     ORDER BY version DESC LIMIT 1",
                )
                .bind(game.id)
                .fetch_optional(&self.pool)
                .await?
            }
            None => None,
        };

        Ok(RoomOverview {
            room,
            latest_game,
            latest_snapshot,
        })
    }

    /// The room player with the given id, if they belong to the room
    /// identified by `code`.
    pub async fn get_room_player_in_room(
        &self,
        code: &str,
        room_player_id: Uuid,
    ) -> Result<RoomPlayer, StoreError> {
        let room = self.get_room_by_code(code).await?;
        sqlx::query_as::<_, RoomPlayer>(&format!(
            "SELECT {ROOM_PLAYER_COLUMNS} FROM room_players \
             WHERE room_id = $1 AND id = $2"
        ))
        .bind(room.id)
        .bind(room_player_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotInRoom)
    }

    /// The room player backed by the given user account, if any.
    pub async fn get_room_player_by_user_in_room(
        &self,
        code: &str,
        user_id: Uuid,
    ) -> Result<RoomPlayer, StoreError> {
        let room = self.get_room_by_code(code).await?;
        sqlx::query_as::<_, RoomPlayer>(&format!(
            "SELECT {ROOM_PLAYER_COLUMNS} FROM room_players \
             WHERE room_id = $1 AND user_id = $2 \
             ORDER BY created_at LIMIT 1"
        ))
        .bind(room.id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::UserNotInRoom)
    }

    /// Persists one chat line. Append-only; no history API beyond this.
    pub async fn append_chat_message(
        &self,
        room_id: Uuid,
        game_id: Option<Uuid>,
        room_player_id: Uuid,
        body: &str,
    ) -> Result<ChatMessage, StoreError> {
        let message = sqlx::query_as::<_, ChatMessage>(
            "INSERT INTO chat_messages (room_id, game_id, room_player_id, body) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, room_id, game_id, room_player_id, body, created_at",
        )
        .bind(room_id)
        .bind(game_id)
        .bind(room_player_id)
        .bind(body)
        .fetch_one(&self.pool)
        .await?;
        Ok(message)
    }
}
