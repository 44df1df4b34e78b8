//! Wire protocol: the tagged messages peers exchange, and their encoding.
//!
//! Every message is a `{type, payload}` record. We model that as a Rust
//! *enum* with named fields — a tagged union where pattern matching forces
//! every variant to be handled. `#[serde(tag = "type", content = "payload")]`
//! makes `serde_json` produce exactly that two-field shape on the wire,
//! matching the reference implementation's own `json.dumps({"type": ...,
//! "payload": ...})` byte for byte.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::membership::{MembershipView, NodeId};

/// Messages exchanged between peers, over either the multicast or the
/// direct channel (see the `Transport` column of the message taxonomy).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Message {
    #[serde(rename = "JOIN_REQUEST")]
    JoinRequest { tcp_port: u16, nickname: String },

    #[serde(rename = "JOIN_RESPONSE")]
    JoinResponse {
        new_id: NodeId,
        peers: MembershipView,
        coordinator_id: NodeId,
        history: Vec<String>,
    },

    #[serde(rename = "PEER_UPDATE")]
    PeerUpdate {
        peers: MembershipView,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        joined: Option<NodeId>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        nickname: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        departed: Option<NodeId>,
    },

    #[serde(rename = "CHAT_MESSAGE")]
    ChatMessage { sender_id: NodeId, text: String },

    #[serde(rename = "HEARTBEAT")]
    Heartbeat { coordinator_id: NodeId },

    #[serde(rename = "ELECTION")]
    Election { sender_id: NodeId },

    #[serde(rename = "ELECTION_OK")]
    ElectionOk { sender_id: NodeId },

    #[serde(rename = "COORDINATOR_ANNOUNCEMENT")]
    CoordinatorAnnouncement { coordinator_id: NodeId },

    #[serde(rename = "LEAVE_REQUEST")]
    LeaveRequest { node_id: NodeId },
}

impl Message {
    /// Encode a message to its on-wire UTF-8 JSON form.
    ///
    /// This never fails for our message types (no floats, no non-string
    /// map keys after the derive), matching the teacher's own use of
    /// `.unwrap()` at analogous "serialization of a known-good type never
    /// fails" call sites — but we still surface the improbable error via
    /// `?` rather than panicking, since this crosses a process boundary.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("encoding message to JSON")
    }

    /// Decode a message from raw bytes.
    ///
    /// Per the decode-error policy (malformed message or unknown tag):
    /// callers are expected to treat any `Err` here as "discard this
    /// message and move on" rather than propagate it further.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("decoding message from JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::{NetAddr, PeerRecord};

    fn roundtrip(msg: &Message) -> Message {
        let bytes = msg.encode().expect("encode");
        Message::decode(&bytes).expect("decode")
    }

    #[test]
    fn join_request_roundtrips() {
        let msg = Message::JoinRequest {
            tcp_port: 10123,
            nickname: "alice".into(),
        };
        match roundtrip(&msg) {
            Message::JoinRequest { tcp_port, nickname } => {
                assert_eq!(tcp_port, 10123);
                assert_eq!(nickname, "alice");
            }
            other => panic!("expected JoinRequest, got {other:?}"),
        }
    }

    #[test]
    fn join_response_roundtrips() {
        let mut peers = MembershipView::new();
        peers.insert(PeerRecord {
            id: NodeId(1),
            addr: NetAddr::new("127.0.0.1", 10101),
            nickname: "a".into(),
        });
        let msg = Message::JoinResponse {
            new_id: NodeId(2),
            peers,
            coordinator_id: NodeId(1),
            history: vec!["[a (ID:1)]: hi".into()],
        };
        match roundtrip(&msg) {
            Message::JoinResponse {
                new_id,
                peers,
                coordinator_id,
                history,
            } => {
                assert_eq!(new_id, NodeId(2));
                assert_eq!(coordinator_id, NodeId(1));
                assert_eq!(peers.len(), 1);
                assert_eq!(history, vec!["[a (ID:1)]: hi".to_string()]);
            }
            other => panic!("expected JoinResponse, got {other:?}"),
        }
    }

    #[test]
    fn peer_update_omits_absent_optional_fields_on_the_wire() {
        let msg = Message::PeerUpdate {
            peers: MembershipView::new(),
            joined: Some(NodeId(2)),
            nickname: Some("b".into()),
            departed: None,
        };
        let bytes = msg.encode().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("departed"));
        assert!(text.contains("joined"));
    }

    #[test]
    fn election_family_roundtrips() {
        let election = Message::Election {
            sender_id: NodeId(3),
        };
        let ok = Message::ElectionOk {
            sender_id: NodeId(3),
        };
        let announce = Message::CoordinatorAnnouncement {
            coordinator_id: NodeId(4),
        };
        assert!(matches!(roundtrip(&election), Message::Election { sender_id } if sender_id == NodeId(3)));
        assert!(matches!(roundtrip(&ok), Message::ElectionOk { sender_id } if sender_id == NodeId(3)));
        assert!(
            matches!(roundtrip(&announce), Message::CoordinatorAnnouncement { coordinator_id } if coordinator_id == NodeId(4))
        );
    }

    #[test]
    fn heartbeat_and_leave_and_chat_roundtrip() {
        let hb = Message::Heartbeat {
            coordinator_id: NodeId(1),
        };
        let leave = Message::LeaveRequest {
            node_id: NodeId(2),
        };
        let chat = Message::ChatMessage {
            sender_id: NodeId(2),
            text: "hello".into(),
        };
        assert!(
            matches!(roundtrip(&hb), Message::Heartbeat { coordinator_id } if coordinator_id == NodeId(1))
        );
        assert!(matches!(roundtrip(&leave), Message::LeaveRequest { node_id } if node_id == NodeId(2)));
        assert!(
            matches!(roundtrip(&chat), Message::ChatMessage { sender_id, text } if sender_id == NodeId(2) && text == "hello")
        );
    }

    #[test]
    fn decoding_malformed_bytes_is_an_error_not_a_panic() {
        assert!(Message::decode(b"not json").is_err());
        assert!(Message::decode(br#"{"type":"NOT_A_REAL_TAG","payload":{}}"#).is_err());
    }

    #[test]
    fn wire_shape_matches_the_reference_json_grammar() {
        let msg = Message::Heartbeat {
            coordinator_id: NodeId(7),
        };
        let text = String::from_utf8(msg.encode().unwrap()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "HEARTBEAT");
        assert_eq!(value["payload"]["coordinator_id"], 7);
    }
}
