//! The game engine: a rule-driven phase state machine.
//!
//! The engine owns no state between calls. Every move loads the latest
//! snapshot through the [`GameStateStore`] port, validates the move
//! against the current phase, computes the next state, and persists it
//! back through the same port — event, snapshot, and any game-status
//! transition in one atomic store operation. Callers get the next state
//! plus the events to broadcast, or an error with nothing written.
//!
//! ```text
//! lobby ──start_game──▶ team_selection ──propose_team──▶ team_vote
//!                            ▲                              │
//!                            │               team_rejected  │
//!                            ├──────────────────────────────┤
//!                            │                              ▼
//!                            │                         mission_vote
//!                            │                              │
//!                            │         mission_resolved     │
//!                            ◀──────────────────────────────┤
//!                                                           ▼
//!                                                        finished
//! ```

mod engine;
mod error;
mod rules;
mod state;
mod store;

pub use engine::{ApplyOutcome, Engine, OutgoingEvent};
pub use error::EngineError;
pub use rules::{
    default_team_sizes, PhaseDef, RulesConfig, ACTION_PROPOSE_TEAM,
    ACTION_START_GAME, ACTION_VOTE,
};
pub use state::{
    GameState, GameStatus, MissionResult, MissionVote, Phase, TeamVote, Winner,
};
pub use store::{GameStateStore, StatusChange, VersionedState};
