//! Rules configuration: phase sequence, player bounds, team sizes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::Phase;

pub const ACTION_START_GAME: &str = "start_game";
pub const ACTION_PROPOSE_TEAM: &str = "propose_team";
pub const ACTION_VOTE: &str = "vote";

/// One phase and the action types it admits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseDef {
    pub name: Phase,
    pub allowed_actions: Vec<String>,
}

/// Tunable rules the engine is constructed with. The classic preset is
/// the default; a game's `config` JSON may select a preset by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    pub phases: Vec<PhaseDef>,
    pub min_players: usize,
    pub max_players: usize,
    /// Team size per round (1-based round index). `None` selects the
    /// classic table for the actual player count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_sizes: Option<Vec<usize>>,
    /// Mission failures that hand evil the win.
    pub fail_threshold: usize,
    /// Mission successes that hand good the win.
    pub success_threshold: usize,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self::classic()
    }
}

impl RulesConfig {
    /// Classic five-round rules for 5–10 players.
    pub fn classic() -> Self {
        Self {
            phases: vec![
                PhaseDef {
                    name: Phase::Lobby,
                    allowed_actions: vec![ACTION_START_GAME.to_string()],
                },
                PhaseDef {
                    name: Phase::TeamSelection,
                    allowed_actions: vec![ACTION_PROPOSE_TEAM.to_string()],
                },
                PhaseDef {
                    name: Phase::TeamVote,
                    allowed_actions: vec![ACTION_VOTE.to_string()],
                },
                PhaseDef {
                    name: Phase::MissionVote,
                    allowed_actions: vec![ACTION_VOTE.to_string()],
                },
                // Resolution and finish admit no player actions.
                PhaseDef {
                    name: Phase::MissionResolution,
                    allowed_actions: vec![],
                },
                PhaseDef {
                    name: Phase::Finished,
                    allowed_actions: vec![],
                },
            ],
            min_players: 5,
            max_players: 10,
            team_sizes: None,
            fail_threshold: 3,
            success_threshold: 3,
        }
    }

    /// Loads rules from a game's `config` JSON. Only the `classic`
    /// preset exists today; anything else falls back to it.
    pub fn from_game_config(config: &Value) -> Self {
        match config.get("preset").and_then(Value::as_str) {
            None | Some("classic") => Self::classic(),
            Some(other) => {
                tracing::debug!(preset = other, "unknown rules preset, using classic");
                Self::classic()
            }
        }
    }

    /// Evil player count for `n` players: 2 for 5–6, 3 for 7+.
    pub fn evil_count(n: usize) -> usize {
        if n >= 7 {
            3
        } else {
            2
        }
    }

    /// Effective per-round team sizes for `n` players.
    pub fn team_sizes_for(&self, n: usize) -> Vec<usize> {
        match &self.team_sizes {
            Some(sizes) if !sizes.is_empty() => sizes.clone(),
            _ => default_team_sizes(n).to_vec(),
        }
    }

    /// Action types admitted in `phase`; empty for unknown phases.
    pub fn allowed_actions(&self, phase: Phase) -> &[String] {
        self.phases
            .iter()
            .find(|p| p.name == phase)
            .map(|p| p.allowed_actions.as_slice())
            .unwrap_or(&[])
    }
}

/// Classic mission team sizes per player count. Counts outside 5–10
/// fall back to the 5-player table.
pub fn default_team_sizes(n: usize) -> [usize; 5] {
    match n {
        6 => [2, 3, 4, 3, 4],
        7 => [2, 3, 3, 4, 4],
        8 | 9 | 10 => [3, 4, 4, 5, 5],
        _ => [2, 3, 2, 3, 3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_team_sizes_table() {
        assert_eq!(default_team_sizes(5), [2, 3, 2, 3, 3]);
        assert_eq!(default_team_sizes(6), [2, 3, 4, 3, 4]);
        assert_eq!(default_team_sizes(7), [2, 3, 3, 4, 4]);
        assert_eq!(default_team_sizes(8), [3, 4, 4, 5, 5]);
        assert_eq!(default_team_sizes(9), [3, 4, 4, 5, 5]);
        assert_eq!(default_team_sizes(10), [3, 4, 4, 5, 5]);
    }

    #[test]
    fn test_evil_count_by_player_count() {
        assert_eq!(RulesConfig::evil_count(5), 2);
        assert_eq!(RulesConfig::evil_count(6), 2);
        assert_eq!(RulesConfig::evil_count(7), 3);
        assert_eq!(RulesConfig::evil_count(10), 3);
    }

    #[test]
    fn test_classic_allows_vote_only_in_vote_phases() {
        let rules = RulesConfig::classic();
        assert_eq!(
            rules.allowed_actions(Phase::TeamSelection),
            [ACTION_PROPOSE_TEAM.to_string()]
        );
        assert_eq!(
            rules.allowed_actions(Phase::TeamVote),
            [ACTION_VOTE.to_string()]
        );
        assert!(rules.allowed_actions(Phase::Finished).is_empty());
        assert!(rules.allowed_actions(Phase::MissionResolution).is_empty());
    }

    #[test]
    fn test_team_sizes_override_wins() {
        let rules = RulesConfig {
            team_sizes: Some(vec![1, 1, 1, 1, 1]),
            ..RulesConfig::classic()
        };
        assert_eq!(rules.team_sizes_for(8), vec![1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_from_game_config_falls_back_to_classic() {
        let rules = RulesConfig::from_game_config(&serde_json::json!({}));
        assert_eq!(rules.min_players, 5);
        assert_eq!(rules.max_players, 10);
        assert_eq!(rules.fail_threshold, 3);
        assert_eq!(rules.success_threshold, 3);
    }
}
