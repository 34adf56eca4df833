//! Engine state as serialized into snapshots.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The engine's current substate within a round, or the lobby/finished
/// bookends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Lobby,
    TeamSelection,
    TeamVote,
    MissionVote,
    MissionResolution,
    Finished,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lobby => "lobby",
            Self::TeamSelection => "team_selection",
            Self::TeamVote => "team_vote",
            Self::MissionVote => "mission_vote",
            Self::MissionResolution => "mission_resolution",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Lifecycle status of the game row; transitions only forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    Waiting,
    InProgress,
    Finished,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "waiting",
            Self::InProgress => "in_progress",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// A player's vote on a proposed team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamVote {
    Approve,
    Reject,
}

/// A team member's secret mission vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionVote {
    Success,
    Fail,
}

/// Outcome of a completed mission round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionResult {
    Success,
    Fail,
}

/// The winning side once the game is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Good,
    Evil,
}

/// Full engine state, serialized as the snapshot payload.
///
/// Everything except `phase` defaults, so the initial lobby snapshot
/// (`{"phase":"lobby"}`) round-trips. Vote maps are `BTreeMap` so the
/// serialized form is stable across runs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GameState {
    #[serde(default)]
    pub game_id: Uuid,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub status: GameStatus,
    /// 1-based mission round.
    #[serde(default)]
    pub round_index: u32,
    /// Index into `player_ids`; determines the current leader.
    #[serde(default)]
    pub leader_index: usize,
    /// Room-player ids in join order; fixes seating and leader rotation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub player_ids: Vec<Uuid>,
    /// Role token per player, e.g. "good" / "evil".
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub roles: BTreeMap<Uuid, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proposed_team: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub team_votes: BTreeMap<Uuid, TeamVote>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mission_votes: BTreeMap<Uuid, MissionVote>,
    /// One entry per completed round.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mission_results: Vec<MissionResult>,
    /// Consecutive team rejections since the last approval.
    #[serde(default)]
    pub reject_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
    /// Snapshot version; set from the store row on load and after writes.
    #[serde(default)]
    pub version: i32,
}

impl GameState {
    /// The room-player id of the current leader, if seating is set.
    pub fn leader(&self) -> Option<Uuid> {
        self.player_ids.get(self.leader_index).copied()
    }

    pub fn has_player(&self, id: Uuid) -> bool {
        self.player_ids.contains(&id)
    }

    pub fn is_on_proposed_team(&self, id: Uuid) -> bool {
        self.proposed_team.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_state_serde_round_trip() {
        let players = ids(5);
        let mut state = GameState {
            game_id: Uuid::new_v4(),
            phase: Phase::TeamVote,
            status: GameStatus::InProgress,
            round_index: 2,
            leader_index: 1,
            player_ids: players.clone(),
            proposed_team: players[..3].to_vec(),
            reject_count: 1,
            version: 4,
            ..GameState::default()
        };
        state.roles.insert(players[0], "evil".to_string());
        state.team_votes.insert(players[0], TeamVote::Approve);
        state.mission_results.push(MissionResult::Success);

        let value = serde_json::to_value(&state).unwrap();
        let back: GameState = serde_json::from_value(value).unwrap();
        assert_eq!(state, back);
    }

    #[test]
    fn test_lobby_snapshot_parses_with_defaults() {
        let state: GameState =
            serde_json::from_str(r#"{"phase":"lobby"}"#).unwrap();
        assert_eq!(state.phase, Phase::Lobby);
        assert_eq!(state.status, GameStatus::Waiting);
        assert!(state.player_ids.is_empty());
        assert!(state.winner.is_none());
    }

    #[test]
    fn test_empty_collections_are_omitted() {
        let state = GameState::default();
        let value = serde_json::to_value(&state).unwrap();
        assert!(value.get("team_votes").is_none());
        assert!(value.get("proposed_team").is_none());
        assert!(value.get("mission_results").is_none());
        assert!(value.get("winner").is_none());
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Phase::TeamSelection).unwrap(),
            "\"team_selection\""
        );
        assert_eq!(Phase::MissionVote.to_string(), "mission_vote");
    }

    #[test]
    fn test_leader_follows_index() {
        let players = ids(5);
        let state = GameState {
            player_ids: players.clone(),
            leader_index: 3,
            ..GameState::default()
        };
        assert_eq!(state.leader(), Some(players[3]));

        let empty = GameState::default();
        assert_eq!(empty.leader(), None);
    }
}
