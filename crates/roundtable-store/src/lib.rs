//! Transactional access to the relational model.
//!
//! One repository per aggregate ([`UserStore`], [`RoomStore`],
//! [`GameStore`]), all sharing one `PgPool`. Every operation either
//! succeeds wholly or leaves state unchanged; multi-row lifecycles
//! (create room, join room, create game, apply move) run inside a
//! single transaction.
//!
//! [`GameStore`] also implements the engine's `GameStateStore` port, so
//! the engine drives persistence without knowing about SQL.

mod db;
mod error;
mod games;
mod models;
mod rooms;
mod users;

pub use db::{connect, migrate};
pub use error::StoreError;
pub use games::{CreatedGame, GameStore};
pub use models::{
    ChatMessage, Game, GameEvent, GamePlayer, Room, RoomOverview, RoomPlayer,
    Snapshot, User, GAME_STATUS_FINISHED, GAME_STATUS_IN_PROGRESS,
    GAME_STATUS_WAITING,
};
pub use rooms::{CreatedRoom, JoinedRoom, RoomStore, ROOM_CODE_ALPHABET, ROOM_CODE_LEN};
pub use users::UserStore;
