//! Engine error surface.
//!
//! Rule violations carry the message shown to the offending client; the
//! hub forwards them in an error envelope to the sender only. Store
//! failures are wrapped opaquely.

use uuid::Uuid;

use crate::state::Phase;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("game not started; use action start_game")]
    NotStarted,

    #[error("only start_game allowed in lobby")]
    LobbyOnlyStartGame,

    #[error("game already finished")]
    AlreadyFinished,

    #[error("game already started")]
    AlreadyStarted,

    #[error("unknown move type {0:?}")]
    UnknownMoveType(String),

    #[error("player count {n} not in range [{min},{max}]")]
    PlayerCount { n: usize, min: usize, max: usize },

    #[error("player not in game")]
    NotInGame,

    #[error("vote not allowed in phase {0}")]
    VoteNotAllowed(Phase),

    #[error("action {action:?} not allowed in phase {phase}")]
    ActionNotAllowed { action: String, phase: Phase },

    #[error("only the leader can propose a team")]
    NotLeader,

    #[error("team must have exactly {0} members for this round")]
    WrongTeamSize(usize),

    #[error("team includes non-player {0}")]
    TeamIncludesNonPlayer(Uuid),

    #[error("only team members can submit mission vote")]
    NotOnTeam,

    #[error("already voted")]
    AlreadyVoted,

    #[error("{0}")]
    InvalidPayload(&'static str),

    #[error("invalid snapshot: {0}")]
    Snapshot(String),

    #[error("store failure: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
    /// Wraps an underlying store failure.
    pub fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Store(Box::new(err))
    }

    /// `true` for failures of the move itself (validation and rules),
    /// as opposed to infrastructure faults.
    pub fn is_rules_violation(&self) -> bool {
        !matches!(self, Self::Store(_) | Self::Snapshot(_))
    }
}
