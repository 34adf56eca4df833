//! The closed error surface of the store.
//!
//! The named variants are the only errors the entry layer maps to
//! specific HTTP statuses; anything else is an opaque internal failure.

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("room not found")]
    RoomNotFound,

    #[error("player not in room")]
    NotInRoom,

    #[error("user not in room")]
    UserNotInRoom,

    #[error("email already registered")]
    EmailExists,

    #[error("password is required")]
    PasswordRequired,

    #[error("invalid password")]
    InvalidPassword,

    #[error("display name already taken in this room")]
    NameTaken,

    #[error("cannot create game: room has no players")]
    RoomHasNoPlayers,

    /// Two concurrent moves raced on (game_id, version) and the retry
    /// also lost.
    #[error("snapshot version conflict")]
    SnapshotConflict,

    #[error("password hashing failed")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("database failure")]
    Database(#[from] sqlx::Error),

    #[error("migration failure")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// `true` when the underlying database error is a unique-index
    /// violation.
    pub(crate) fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            StoreError::Database(sqlx::Error::Database(db))
                if db.is_unique_violation()
        )
    }
}
