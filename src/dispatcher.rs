//! The dispatcher: demultiplexes inbound messages by tag to the component
//! that owns them.
//!
//! Two entry points mirror the two transports: [`handle_multicast`] for
//! datagrams off the discovery/heartbeat channel, [`handle_direct`] for
//! messages read off an accepted TCP connection. A tag arriving on the wrong
//! transport, or one this node's current role has no business seeing, is
//! discarded — the same policy as a malformed payload.

use std::net::SocketAddr;

use crate::chat;
use crate::config::Config;
use crate::coordinator;
use crate::election;
use crate::output::Output;
use crate::state::SharedState;
use crate::wire::Message;

pub async fn handle_multicast(state: &SharedState, message: Message, from: SocketAddr, out: &dyn Output) {
    match message {
        Message::JoinRequest { tcp_port, nickname } => {
            let is_coordinator = state.with(|s| s.is_coordinator());
            if is_coordinator {
                coordinator::handle_join_request(state, from.ip().to_string(), tcp_port, nickname, out).await;
            }
        }
        Message::Heartbeat { coordinator_id } => {
            // Unconditional, matching the reference's `listen_multicast`:
            // a heartbeat is also how a node learns the current
            // coordinator's identity, not just a liveness pulse for one
            // already known. Without this, a node that missed the
            // `COORDINATOR_ANNOUNCEMENT` (a lost direct message, §7) would
            // keep comparing against a stale `coordinator_id` forever and
            // never resync, re-triggering elections indefinitely.
            state.with(|s| {
                s.coordinator_id = coordinator_id;
                s.record_heartbeat();
            });
        }
        _ => {
            // Every other tag travels on the direct channel; anything else
            // arriving here is a protocol error and is discarded.
        }
    }
}

pub async fn handle_direct(state: &SharedState, config: &Config, message: Message, out: &dyn Output) {
    match message {
        Message::JoinResponse {
            new_id,
            peers,
            coordinator_id,
            history,
        } => {
            let already_joined = state.with(|s| s.own_id.is_assigned());
            if already_joined {
                // A late response after self-promotion; discard per §4.4.
                return;
            }
            state.with(|s| {
                s.own_id = new_id;
                s.view = peers;
                s.coordinator_id = coordinator_id;
                s.history = history;
                s.record_heartbeat();
            });
            crate::output::system(out, format!("joined the overlay as node {new_id}"));
        }
        Message::PeerUpdate {
            peers,
            joined,
            nickname: _,
            departed,
        } => {
            state.with(|s| s.view = peers);
            if let Some(id) = joined {
                crate::output::system(out, format!("peer {id} joined"));
            }
            if let Some(id) = departed {
                crate::output::system(out, format!("peer {id} left"));
            }
        }
        Message::ChatMessage { sender_id, text } => {
            chat::handle_chat_message(state, sender_id, &text, out);
        }
        Message::Election { sender_id } => {
            election::handle_election(state, sender_id, config.election_timeout, out).await;
        }
        Message::ElectionOk { sender_id } => {
            election::handle_election_ok(state, sender_id, out);
        }
        Message::CoordinatorAnnouncement { coordinator_id } => {
            election::handle_coordinator_announcement(state, coordinator_id, out);
        }
        Message::LeaveRequest { node_id } => {
            let is_coordinator = state.with(|s| s.is_coordinator());
            if is_coordinator {
                coordinator::handle_leave_request(state, node_id, out).await;
            }
            // A non-coordinator receiving this is an unexpected message for
            // its role; discarded like any other protocol error.
        }
        Message::JoinRequest { .. } | Message::Heartbeat { .. } => {
            // Multicast-only tags arriving on the direct channel: discard.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::membership::{MembershipView, NetAddr, NodeId, PeerRecord};
    use crate::output::CapturingOutput;
    use crate::state::NodeState;
    use std::time::Duration;

    fn test_config() -> Config {
        Config {
            multicast_addr: "224.1.1.1".into(),
            multicast_port: 5007,
            tcp_port_base: 10000,
            heartbeat_interval: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(15),
            election_timeout: Duration::from_secs(5),
            nickname: "n".into(),
        }
    }

    #[tokio::test]
    async fn join_response_is_ignored_once_an_id_is_already_assigned() {
        let mut node = NodeState::new("a".into(), "127.0.0.1".into(), 10001);
        node.own_id = NodeId(1);
        let state = SharedState::new(node);
        let out = CapturingOutput::new();

        handle_direct(
            &state,
            &test_config(),
            Message::JoinResponse {
                new_id: NodeId(2),
                peers: MembershipView::new(),
                coordinator_id: NodeId(2),
                history: vec![],
            },
            &out,
        )
        .await;

        state.with(|s| assert_eq!(s.own_id, NodeId(1)));
        assert!(out.lines().is_empty());
    }

    #[tokio::test]
    async fn join_response_adopts_the_assigned_identifier() {
        let state = SharedState::new(NodeState::new("a".into(), "127.0.0.1".into(), 10001));
        let out = CapturingOutput::new();
        let mut peers = MembershipView::new();
        peers.insert(PeerRecord {
            id: NodeId(1),
            addr: NetAddr::new("127.0.0.1", 10001),
            nickname: "coord".into(),
        });

        handle_direct(
            &state,
            &test_config(),
            Message::JoinResponse {
                new_id: NodeId(2),
                peers,
                coordinator_id: NodeId(1),
                history: vec!["line".into()],
            },
            &out,
        )
        .await;

        state.with(|s| {
            assert_eq!(s.own_id, NodeId(2));
            assert_eq!(s.coordinator_id, NodeId(1));
            assert_eq!(s.history, vec!["line".to_string()]);
        });
    }

    #[tokio::test]
    async fn heartbeat_from_a_different_coordinator_resyncs_identity_and_liveness() {
        // A missed COORDINATOR_ANNOUNCEMENT must not strand a node on a
        // stale coordinator_id forever: the next heartbeat it sees, even
        // from a coordinator it didn't know about, corrects its view.
        let mut node = NodeState::new("a".into(), "127.0.0.1".into(), 10001);
        node.coordinator_id = NodeId(1);
        node.last_heartbeat = std::time::Instant::now() - Duration::from_secs(999);
        let state = SharedState::new(node);
        let out = CapturingOutput::new();
        let from: SocketAddr = ([127, 0, 0, 1], 9999).into();

        handle_multicast(
            &state,
            Message::Heartbeat {
                coordinator_id: NodeId(7),
            },
            from,
            &out,
        )
        .await;

        state.with(|s| {
            assert_eq!(s.coordinator_id, NodeId(7));
            assert!(!s.heartbeat_is_stale(Duration::from_secs(15)));
        });
    }

    #[tokio::test]
    async fn matching_heartbeat_refreshes_liveness() {
        let mut node = NodeState::new("a".into(), "127.0.0.1".into(), 10001);
        node.coordinator_id = NodeId(1);
        node.last_heartbeat = std::time::Instant::now() - Duration::from_secs(999);
        let state = SharedState::new(node);
        let out = CapturingOutput::new();
        let from: SocketAddr = ([127, 0, 0, 1], 9999).into();

        handle_multicast(
            &state,
            Message::Heartbeat {
                coordinator_id: NodeId(1),
            },
            from,
            &out,
        )
        .await;

        state.with(|s| assert!(!s.heartbeat_is_stale(Duration::from_secs(15))));
    }
}
