//! The realtime hub: room-scoped session registry and fan-out.
//!
//! One coordinator task owns the registry of active sessions per room
//! and serializes every delivery — broadcasts and single-session
//! replies alike — so all recipients in a room observe the same order.
//! Sessions talk to the coordinator through a cheap clonable
//! [`HubHandle`]; they never touch the registry directly.
//!
//! Delivery is best-effort: each session has a bounded send queue, and
//! a session that cannot keep up is evicted rather than allowed to
//! block the room. Clients recover with `sync_state`.

mod dispatch;
mod hub;
mod session;

pub use dispatch::MoveRouter;
pub use hub::{spawn_hub, HubHandle, SEND_QUEUE_CAPACITY};
pub use session::{run_session, SessionContext};
