//! Envelope types that travel on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{client, server, MAX_KIND_LEN};

/// The tagged envelope clients send on a room socket.
///
/// `payload` stays schemaless here; each move kind validates its own
/// payload shape where it is handled (engine for votes and actions,
/// dispatch for chat) rather than deep in a shared decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMessage {
    /// One of `chat`, `vote`, `action`, `sync_state`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Optional client-chosen id, echoed nowhere today but reserved for
    /// request/response pairing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ClientMessage {
    /// Returns `true` when `kind` is on the room-socket allowlist and
    /// within the length cap.
    pub fn kind_allowed(&self) -> bool {
        self.kind.len() <= MAX_KIND_LEN
            && client::ALLOWED_KINDS.contains(&self.kind.as_str())
    }
}

/// The envelope the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEnvelope {
    /// One of `event`, `state`, `error`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Event name for `event` and `state` envelopes; absent on errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    pub payload: Value,
}

impl ServerEnvelope {
    /// Builds an `event` envelope for a named engine or chat event.
    pub fn event(name: &str, payload: Value) -> Self {
        Self {
            kind: server::EVENT.to_string(),
            event: Some(name.to_string()),
            payload,
        }
    }

    /// Builds a `state` envelope carrying a full state payload.
    pub fn state(payload: Value) -> Self {
        Self {
            kind: server::STATE.to_string(),
            event: Some(crate::event::STATE.to_string()),
            payload,
        }
    }

    /// Builds an `error` envelope delivered to a single sender.
    pub fn error(message: &str) -> Self {
        Self {
            kind: server::ERROR.to_string(),
            event: None,
            payload: serde_json::json!({ "message": message }),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The wire shapes are a contract with browser clients; these tests
    //! pin the exact JSON our serde attributes produce.

    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_message_parses_tagged_envelope() {
        let raw = r#"{"type":"vote","payload":{"approved":true}}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.kind, "vote");
        assert_eq!(msg.payload, Some(json!({"approved": true})));
        assert!(msg.correlation_id.is_none());
    }

    #[test]
    fn test_client_message_keeps_correlation_id() {
        let raw = r#"{"type":"chat","correlation_id":"c-1","payload":{"message":"hi"}}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.correlation_id.as_deref(), Some("c-1"));
    }

    #[test]
    fn test_client_message_payload_optional() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"sync_state"}"#).unwrap();
        assert_eq!(msg.kind, "sync_state");
        assert!(msg.payload.is_none());
    }

    #[test]
    fn test_kind_allowed_accepts_the_four_room_kinds() {
        for kind in client::ALLOWED_KINDS {
            let msg = ClientMessage {
                kind: kind.to_string(),
                correlation_id: None,
                payload: None,
            };
            assert!(msg.kind_allowed(), "{kind} should be allowed");
        }
    }

    #[test]
    fn test_kind_allowed_rejects_unknown_and_oversized() {
        let unknown = ClientMessage {
            kind: "system".to_string(),
            correlation_id: None,
            payload: None,
        };
        assert!(!unknown.kind_allowed());

        let oversized = ClientMessage {
            kind: "x".repeat(MAX_KIND_LEN + 1),
            correlation_id: None,
            payload: None,
        };
        assert!(!oversized.kind_allowed());
    }

    #[test]
    fn test_event_envelope_json_shape() {
        let env = ServerEnvelope::event(
            crate::event::TEAM_APPROVED,
            json!({"phase": "mission_vote"}),
        );
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["type"], "event");
        assert_eq!(v["event"], "team_approved");
        assert_eq!(v["payload"]["phase"], "mission_vote");
    }

    #[test]
    fn test_state_envelope_json_shape() {
        let env = ServerEnvelope::state(json!({"game_id": "g", "version": 3}));
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["type"], "state");
        assert_eq!(v["event"], "state");
        assert_eq!(v["payload"]["version"], 3);
    }

    #[test]
    fn test_error_envelope_omits_event_field() {
        let env = ServerEnvelope::error("already voted");
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["type"], "error");
        assert_eq!(v["payload"]["message"], "already voted");
        assert!(v.get("event").is_none(), "error envelopes carry no event");
    }

    #[test]
    fn test_server_envelope_round_trip() {
        let env = ServerEnvelope::event(crate::event::CHAT, json!({"message": "gm"}));
        let text = serde_json::to_string(&env).unwrap();
        let back: ServerEnvelope = serde_json::from_str(&text).unwrap();
        assert_eq!(env, back);
    }

    #[test]
    fn test_decode_garbage_returns_error() {
        let result: Result<ClientMessage, _> =
            serde_json::from_slice(b"not json at all");
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_missing_type_returns_error() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"payload":{}}"#);
        assert!(result.is_err());
    }
}
