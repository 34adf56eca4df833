//! Row models shared across repositories and API responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

pub const GAME_STATUS_WAITING: &str = "waiting";
pub const GAME_STATUS_IN_PROGRESS: &str = "in_progress";
pub const GAME_STATUS_FINISHED: &str = "finished";

/// A registered user. The password hash never serializes into API
/// responses.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persistent lobby, addressed by its 6-char join code.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub id: Uuid,
    pub code: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub settings: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A participant identity scoped to one room.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoomPlayer {
    pub id: Uuid,
    pub room_id: Uuid,
    /// Weak reference; a room player can outlive its user account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub display_name: String,
    pub is_host: bool,
    pub created_at: DateTime<Utc>,
}

/// One instance of play within a room.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Game {
    pub id: Uuid,
    pub room_id: Uuid,
    pub status: String,
    pub config: Value,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

/// A room player's membership in one game.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GamePlayer {
    pub id: Uuid,
    pub game_id: Uuid,
    pub room_player_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub joined_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_at: Option<DateTime<Utc>>,
}

/// A versioned full-state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Snapshot {
    pub id: Uuid,
    pub game_id: Uuid,
    pub version: i32,
    pub state: Value,
    pub created_at: DateTime<Utc>,
}

/// One append-only move record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GameEvent {
    pub id: Uuid,
    pub game_id: Uuid,
    /// `None` for system events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_player_id: Option<Uuid>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// One chat line, room-scoped with an optional game.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatMessage {
    pub id: Uuid,
    pub room_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<Uuid>,
    pub room_player_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Room info plus latest game and snapshot, for `GET /rooms/{code}`.
#[derive(Debug, Clone, Serialize)]
pub struct RoomOverview {
    pub room: Room,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_game: Option<Game>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_snapshot: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_serialization_hides_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            display_name: "A".to_string(),
            avatar_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());
        assert!(value.get("avatar_url").is_none());
        assert_eq!(value["email"], "a@example.com");
    }

    #[test]
    fn test_room_serialization_hides_password_hash() {
        let room = Room {
            id: Uuid::new_v4(),
            code: "ABC234".to_string(),
            password_hash: Some("$2b$12$secret".to_string()),
            settings: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&room).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["code"], "ABC234");
    }

    #[test]
    fn test_game_event_kind_serializes_as_type() {
        let event = GameEvent {
            id: Uuid::new_v4(),
            game_id: Uuid::new_v4(),
            room_player_id: None,
            kind: "vote".to_string(),
            payload: serde_json::json!({"approved": true}),
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "vote");
        assert!(value.get("kind").is_none());
    }
}
