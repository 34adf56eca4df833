//! Claim payloads carried inside tokens.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims of a room-session token: which player in which room, until when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomClaims {
    pub room_id: Uuid,
    pub room_player_id: Uuid,
    /// Unix timestamp (seconds) after which the token is rejected.
    pub exp: i64,
}

/// Claims of a user-session token.
///
/// Deliberately shares no required field with [`RoomClaims`] besides
/// `exp`, so one variant can never verify as the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    pub user_id: Uuid,
    pub exp: i64,
}
