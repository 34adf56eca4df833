//! Wire protocol for the room socket.
//!
//! This crate defines the "language" spoken over a room WebSocket:
//!
//! - [`ClientMessage`] — the tagged envelope clients send
//!   (`chat` / `vote` / `action` / `sync_state`).
//! - [`ServerEnvelope`] — what the server sends back
//!   (`event` / `state` / `error` shapes).
//! - The event names emitted by the engine and the chat path.
//!
//! The protocol layer knows nothing about rooms, sessions, or the
//! database — it only fixes the JSON shapes both sides agree on.

mod types;

pub use types::{ClientMessage, ServerEnvelope};

/// Client → server message kinds accepted on a room socket.
pub mod client {
    pub const CHAT: &str = "chat";
    pub const VOTE: &str = "vote";
    pub const ACTION: &str = "action";
    pub const SYNC_STATE: &str = "sync_state";

    /// The allowlist for [`ClientMessage::kind`](super::ClientMessage).
    /// Anything else is rejected with an error envelope.
    pub const ALLOWED_KINDS: [&str; 4] = [CHAT, VOTE, ACTION, SYNC_STATE];
}

/// Server → client envelope kinds.
pub mod server {
    pub const EVENT: &str = "event";
    pub const STATE: &str = "state";
    pub const ERROR: &str = "error";
}

/// Event names carried in `event` envelopes.
pub mod event {
    pub const CHAT: &str = "chat";
    pub const VOTE_RECORDED: &str = "vote_recorded";
    pub const TEAM_PROPOSED: &str = "team_proposed";
    pub const TEAM_APPROVED: &str = "team_approved";
    pub const TEAM_REJECTED: &str = "team_rejected";
    pub const MISSION_RESOLVED: &str = "mission_resolved";
    pub const GAME_STARTED: &str = "game_started";
    pub const GAME_ENDED: &str = "game_ended";
    pub const STATE: &str = "state";
}

/// Maximum inbound frame size on a room socket (512 KiB).
pub const MAX_MESSAGE_BYTES: usize = 512 * 1024;

/// Maximum chat message length in characters; longer bodies are trimmed.
pub const MAX_CHAT_LEN: usize = 2000;

/// Upper bound on the `type` field length, to cap hostile input before
/// the allowlist check.
pub const MAX_KIND_LEN: usize = 64;
