//! Move validation, phase transitions, and terminal-condition checks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::EngineError;
use crate::rules::{RulesConfig, ACTION_PROPOSE_TEAM, ACTION_START_GAME};
use crate::state::{
    GameState, GameStatus, MissionResult, MissionVote, Phase, TeamVote, Winner,
};
use crate::store::{GameStateStore, StatusChange};

/// An event to broadcast to the room after a move is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEvent {
    pub name: String,
    pub payload: Value,
}

impl OutgoingEvent {
    fn new(name: &str, payload: Value) -> Self {
        Self {
            name: name.to_string(),
            payload,
        }
    }
}

/// Result of an accepted move: the persisted next state and the events
/// to fan out.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    pub state: GameState,
    pub events: Vec<OutgoingEvent>,
}

/// Per-process counter mixed into shuffle seeds so two games started in
/// the same clock tick still shuffle differently.
static SHUFFLE_COUNTER: AtomicU64 = AtomicU64::new(0);

fn shuffle_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let count = SHUFFLE_COUNTER.fetch_add(1, Ordering::Relaxed);
    nanos ^ count.wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

/// Applies moves and drives phase transitions. Owns no game state; the
/// latest snapshot is loaded from and written back through `S`.
pub struct Engine<S> {
    store: S,
    rules: RulesConfig,
}

impl<S: GameStateStore> Engine<S> {
    pub fn new(store: S, rules: RulesConfig) -> Self {
        Self { store, rules }
    }

    /// Loads the latest snapshot as a typed state, or `None` before the
    /// first write. The row version overrides whatever the payload
    /// carried.
    pub async fn latest_state(
        &self,
        game_id: Uuid,
    ) -> Result<Option<GameState>, EngineError> {
        let Some(snapshot) = self.store.latest_snapshot(game_id).await? else {
            return Ok(None);
        };
        let mut state: GameState = serde_json::from_value(snapshot.state)
            .map_err(|e| EngineError::Snapshot(e.to_string()))?;
        state.game_id = game_id;
        state.version = snapshot.version;
        Ok(Some(state))
    }

    /// Validates and applies one move. On success the event and next
    /// snapshot are already persisted; on error nothing was written.
    pub async fn apply_move(
        &self,
        game_id: Uuid,
        actor: Uuid,
        move_kind: &str,
        payload: Value,
    ) -> Result<ApplyOutcome, EngineError> {
        let payload = into_object(payload);
        let current = self.latest_state(game_id).await?;

        // No snapshot, or a lobby with no seating yet: the only legal
        // move is start_game, which bootstraps seating from the store.
        let state = match current {
            Some(s) if !(s.phase == Phase::Lobby && s.player_ids.is_empty()) => s,
            _ => {
                if move_kind != "action" {
                    return Err(EngineError::NotStarted);
                }
                if action_name(&payload) != Some(ACTION_START_GAME) {
                    return Err(EngineError::LobbyOnlyStartGame);
                }
                return self.start_game(game_id, actor, payload).await;
            }
        };

        if state.status == GameStatus::Finished {
            return Err(EngineError::AlreadyFinished);
        }

        let (next, events) = match move_kind {
            "vote" => self.apply_vote(&state, actor, &payload)?,
            "action" => self.apply_action(&state, actor, &payload)?,
            other => return Err(EngineError::UnknownMoveType(other.to_string())),
        };

        self.persist(game_id, Some(actor), move_kind, payload, &state, next, events)
            .await
    }

    /// Bootstraps a game: loads seating from the store, deals roles,
    /// and moves to the first team selection.
    async fn start_game(
        &self,
        game_id: Uuid,
        actor: Uuid,
        payload: Map<String, Value>,
    ) -> Result<ApplyOutcome, EngineError> {
        let player_ids = self.store.player_ids_in_join_order(game_id).await?;
        let n = player_ids.len();
        if n < self.rules.min_players || n > self.rules.max_players {
            return Err(EngineError::PlayerCount {
                n,
                min: self.rules.min_players,
                max: self.rules.max_players,
            });
        }

        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(shuffle_seed());
        order.shuffle(&mut rng);

        let mut state = GameState {
            game_id,
            phase: Phase::TeamSelection,
            status: GameStatus::InProgress,
            round_index: 1,
            leader_index: 0,
            player_ids,
            ..GameState::default()
        };
        for &i in order.iter().take(RulesConfig::evil_count(n)) {
            state.roles.insert(state.player_ids[i], "evil".to_string());
        }
        for id in &state.player_ids {
            state.roles.entry(*id).or_insert_with(|| "good".to_string());
        }

        let events = vec![OutgoingEvent::new(
            "game_started",
            json!({
                "phase": state.phase,
                "round_index": state.round_index,
                "leader_id": state.leader(),
            }),
        )];

        let next_state = serde_json::to_value(&state)
            .map_err(|e| EngineError::Snapshot(e.to_string()))?;
        let version = self
            .store
            .append_event_and_snapshot(
                game_id,
                Some(actor),
                "action",
                with_move_type(payload, "action"),
                next_state,
                Some(StatusChange::Started),
            )
            .await?;
        state.version = version;

        tracing::info!(%game_id, players = n, "game started");
        Ok(ApplyOutcome { state, events })
    }

    fn apply_vote(
        &self,
        state: &GameState,
        actor: Uuid,
        payload: &Map<String, Value>,
    ) -> Result<(GameState, Vec<OutgoingEvent>), EngineError> {
        if !state.has_player(actor) {
            return Err(EngineError::NotInGame);
        }

        match state.phase {
            Phase::TeamVote => self.apply_team_vote(state, actor, payload),
            Phase::MissionVote => self.apply_mission_vote(state, actor, payload),
            phase => Err(EngineError::VoteNotAllowed(phase)),
        }
    }

    fn apply_team_vote(
        &self,
        state: &GameState,
        actor: Uuid,
        payload: &Map<String, Value>,
    ) -> Result<(GameState, Vec<OutgoingEvent>), EngineError> {
        let approved = payload_bool(payload, "approved").ok_or(
            EngineError::InvalidPayload("payload must include approved: true/false"),
        )?;
        if state.team_votes.contains_key(&actor) {
            return Err(EngineError::AlreadyVoted);
        }

        let mut next = state.clone();
        next.team_votes.insert(
            actor,
            if approved {
                TeamVote::Approve
            } else {
                TeamVote::Reject
            },
        );

        if next.team_votes.len() < next.player_ids.len() {
            let event =
                OutgoingEvent::new("vote_recorded", json!({ "player_id": actor }));
            return Ok((next, vec![event]));
        }

        // Everyone has voted: strict majority approves the team.
        let approvals = next
            .team_votes
            .values()
            .filter(|v| **v == TeamVote::Approve)
            .count();
        if approvals > next.player_ids.len() / 2 {
            next.phase = Phase::MissionVote;
            next.team_votes.clear();
            let event =
                OutgoingEvent::new("team_approved", json!({ "phase": next.phase }));
            return Ok((next, vec![event]));
        }

        next.reject_count += 1;
        next.phase = Phase::TeamSelection;
        next.leader_index = (next.leader_index + 1) % next.player_ids.len();
        next.proposed_team.clear();
        next.team_votes.clear();
        let event = OutgoingEvent::new(
            "team_rejected",
            json!({
                "phase": next.phase,
                "reject_count": next.reject_count,
                "leader_id": next.leader(),
            }),
        );
        Ok((next, vec![event]))
    }

    fn apply_mission_vote(
        &self,
        state: &GameState,
        actor: Uuid,
        payload: &Map<String, Value>,
    ) -> Result<(GameState, Vec<OutgoingEvent>), EngineError> {
        let success = payload_bool(payload, "success").ok_or(
            EngineError::InvalidPayload(
                "payload must include success: true/false for mission vote",
            ),
        )?;
        if !state.is_on_proposed_team(actor) {
            return Err(EngineError::NotOnTeam);
        }
        if state.mission_votes.contains_key(&actor) {
            return Err(EngineError::AlreadyVoted);
        }

        let mut next = state.clone();
        next.mission_votes.insert(
            actor,
            if success {
                MissionVote::Success
            } else {
                MissionVote::Fail
            },
        );

        if next.mission_votes.len() < state.proposed_team.len() {
            let event =
                OutgoingEvent::new("vote_recorded", json!({ "player_id": actor }));
            return Ok((next, vec![event]));
        }

        // A single fail vote sinks the mission.
        let result = if next
            .mission_votes
            .values()
            .any(|v| *v == MissionVote::Fail)
        {
            MissionResult::Fail
        } else {
            MissionResult::Success
        };
        next.mission_results.push(result);
        next.mission_votes.clear();
        next.proposed_team.clear();

        let fails = next
            .mission_results
            .iter()
            .filter(|r| **r == MissionResult::Fail)
            .count();
        let successes = next.mission_results.len() - fails;

        if fails >= self.rules.fail_threshold {
            next.status = GameStatus::Finished;
            next.phase = Phase::Finished;
            next.winner = Some(Winner::Evil);
            let event = OutgoingEvent::new(
                "game_ended",
                json!({ "winner": next.winner, "mission_result": result }),
            );
            return Ok((next, vec![event]));
        }
        if successes >= self.rules.success_threshold {
            next.status = GameStatus::Finished;
            next.phase = Phase::Finished;
            next.winner = Some(Winner::Good);
            let event = OutgoingEvent::new(
                "game_ended",
                json!({ "winner": next.winner, "mission_result": result }),
            );
            return Ok((next, vec![event]));
        }

        next.round_index += 1;
        next.leader_index = (next.leader_index + 1) % next.player_ids.len();
        next.reject_count = 0;
        next.phase = Phase::TeamSelection;
        let event = OutgoingEvent::new(
            "mission_resolved",
            json!({
                "result": result,
                "round_index": next.round_index,
                "leader_id": next.leader(),
                "phase": next.phase,
            }),
        );
        Ok((next, vec![event]))
    }

    fn apply_action(
        &self,
        state: &GameState,
        actor: Uuid,
        payload: &Map<String, Value>,
    ) -> Result<(GameState, Vec<OutgoingEvent>), EngineError> {
        let action = action_name(payload)
            .ok_or(EngineError::InvalidPayload("payload must include action"))?;

        if !self
            .rules
            .allowed_actions(state.phase)
            .iter()
            .any(|a| a == action)
        {
            return Err(EngineError::ActionNotAllowed {
                action: action.to_string(),
                phase: state.phase,
            });
        }

        match action {
            // Seating exists, so the game is already running.
            ACTION_START_GAME => Err(EngineError::AlreadyStarted),
            ACTION_PROPOSE_TEAM => self.apply_propose_team(state, actor, payload),
            other => Err(EngineError::ActionNotAllowed {
                action: other.to_string(),
                phase: state.phase,
            }),
        }
    }

    fn apply_propose_team(
        &self,
        state: &GameState,
        actor: Uuid,
        payload: &Map<String, Value>,
    ) -> Result<(GameState, Vec<OutgoingEvent>), EngineError> {
        if state.leader() != Some(actor) {
            return Err(EngineError::NotLeader);
        }

        let team = payload_team(payload).ok_or(EngineError::InvalidPayload(
            "payload must include team_ids (array of room_player_id)",
        ))?;

        let sizes = self.rules.team_sizes_for(state.player_ids.len());
        let round = (state.round_index as usize).clamp(1, sizes.len());
        let required = sizes[round - 1];
        if team.len() != required {
            return Err(EngineError::WrongTeamSize(required));
        }
        for id in &team {
            if !state.has_player(*id) {
                return Err(EngineError::TeamIncludesNonPlayer(*id));
            }
        }

        let mut next = state.clone();
        next.proposed_team = team;
        next.phase = Phase::TeamVote;
        next.team_votes.clear();
        let event = OutgoingEvent::new(
            "team_proposed",
            json!({ "team": next.proposed_team, "phase": next.phase }),
        );
        Ok((next, vec![event]))
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist(
        &self,
        game_id: Uuid,
        actor: Option<Uuid>,
        move_kind: &str,
        payload: Map<String, Value>,
        prev: &GameState,
        mut next: GameState,
        events: Vec<OutgoingEvent>,
    ) -> Result<ApplyOutcome, EngineError> {
        let status_change = if next.status == GameStatus::Finished
            && prev.status != GameStatus::Finished
        {
            Some(StatusChange::Finished {
                ended_at: Utc::now(),
            })
        } else {
            None
        };

        let next_state = serde_json::to_value(&next)
            .map_err(|e| EngineError::Snapshot(e.to_string()))?;
        let version = self
            .store
            .append_event_and_snapshot(
                game_id,
                actor,
                move_kind,
                with_move_type(payload, move_kind),
                next_state,
                status_change,
            )
            .await?;
        next.version = version;

        tracing::debug!(
            %game_id,
            move_kind,
            version,
            phase = %next.phase,
            "move applied"
        );
        Ok(ApplyOutcome {
            state: next,
            events,
        })
    }
}

/// Coerces a payload value to an object; anything else becomes empty.
fn into_object(payload: Value) -> Map<String, Value> {
    match payload {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// The action named by an `action` payload, with the original's `type`
/// fallback.
fn action_name(payload: &Map<String, Value>) -> Option<&str> {
    payload
        .get("action")
        .and_then(Value::as_str)
        .or_else(|| payload.get("type").and_then(Value::as_str))
}

/// Reads a boolean that lenient clients may send as `"true"`/`"false"`.
fn payload_bool(payload: &Map<String, Value>, key: &str) -> Option<bool> {
    match payload.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    }
}

/// Reads the proposed team from `team_ids`, falling back to `team`.
fn payload_team(payload: &Map<String, Value>) -> Option<Vec<Uuid>> {
    let raw = payload
        .get("team_ids")
        .or_else(|| payload.get("team"))?
        .as_array()?;
    let mut team = Vec::with_capacity(raw.len());
    for entry in raw {
        team.push(Uuid::parse_str(entry.as_str()?).ok()?);
    }
    Some(team)
}

/// Stamps the move kind into the stored event payload.
fn with_move_type(mut payload: Map<String, Value>, move_kind: &str) -> Value {
    payload.insert("move_type".to_string(), json!(move_kind));
    Value::Object(payload)
}
