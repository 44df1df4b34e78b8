//! The coordinator role: admission, membership dissemination, and heartbeats.
//!
//! Only the node currently holding the coordinator role ever calls
//! [`handle_join_request`] or [`handle_leave_request`] — the dispatcher
//! checks `is_coordinator` before routing here, matching the spec's
//! description of admission as something the coordinator alone performs.

use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::membership::{NetAddr, NodeId, PeerRecord};
use crate::output::{self, Output};
use crate::state::SharedState;
use crate::transport::{direct, multicast};
use crate::wire::Message;

/// Admit a freshly observed `JOIN_REQUEST`: assign an identifier, record the
/// peer, reply directly with the full view and history, then fan out a
/// `PEER_UPDATE` to everyone else.
pub async fn handle_join_request(
    state: &SharedState,
    from_host: String,
    tcp_port: u16,
    nickname: String,
    out: &dyn Output,
) {
    let (response, fan_out_targets, fan_out_msg, new_addr) = state.with(|s| {
        let new_id = s.view.next_id();
        let addr = NetAddr::new(from_host, tcp_port);
        let record = PeerRecord {
            id: new_id,
            addr: addr.clone(),
            nickname: nickname.clone(),
        };
        s.view.insert(record);

        let response = Message::JoinResponse {
            new_id,
            peers: s.view.clone(),
            coordinator_id: s.coordinator_id,
            history: s.history.clone(),
        };

        let fan_out_targets: Vec<PeerRecord> = s
            .view
            .others(s.own_id)
            .filter(|p| p.id != new_id)
            .cloned()
            .collect();
        let fan_out_msg = Message::PeerUpdate {
            peers: s.view.clone(),
            joined: Some(new_id),
            nickname: Some(nickname),
            departed: None,
        };

        (response, fan_out_targets, fan_out_msg, addr)
    });

    // A failed send here is a transport error (§7): swallow it and still
    // fan out, the same as the reference's `send_tcp_message_by_addr`. The
    // peer is already recorded in the view regardless of whether it ever
    // heard back, so the rest of the overlay must learn about it too.
    match direct::send_to(&new_addr, &response).await {
        Ok(()) => output::coordinator(out, format!("admitted new peer at {new_addr}")),
        Err(err) => output::system(out, format!("join response to {new_addr} failed: {err}")),
    }

    for peer in fan_out_targets {
        if let Err(err) = direct::send_to(&peer.addr, &fan_out_msg).await {
            output::system(out, format!("peer update to {} failed: {err}", peer.id));
        }
    }
}

/// Remove a departing peer and announce the new view to whoever is left.
pub async fn handle_leave_request(state: &SharedState, node_id: NodeId, out: &dyn Output) {
    let announce = state.with(|s| {
        let removed = s.view.remove(node_id);
        removed.map(|_| {
            let targets: Vec<PeerRecord> = s.view.others(s.own_id).cloned().collect();
            let msg = Message::PeerUpdate {
                peers: s.view.clone(),
                joined: None,
                nickname: None,
                departed: Some(node_id),
            };
            (targets, msg)
        })
    });

    let Some((targets, msg)) = announce else {
        return;
    };
    output::coordinator(out, format!("peer {node_id} left"));
    for peer in targets {
        if let Err(err) = direct::send_to(&peer.addr, &msg).await {
            output::system(out, format!("departure announcement to {} failed: {err}", peer.id));
        }
    }
}

/// Become coordinator because no one answered the initial `JOIN_REQUEST`.
pub fn promote_bootstrap(state: &SharedState, out: &dyn Output) {
    state.with(|s| {
        s.own_id = NodeId(1);
        s.coordinator_id = NodeId(1);
        s.in_election = false;
        let record = s.self_record();
        s.view.insert(record);
        s.record_heartbeat();
    });
    output::system(out, "no peers found, starting the overlay as its first node");
}

/// Become coordinator by winning (or walking away with) an election.
pub async fn promote_election_victory(state: &SharedState, out: &dyn Output) {
    let (own_id, targets) = state.with(|s| {
        s.coordinator_id = s.own_id;
        s.in_election = false;
        s.record_heartbeat();
        let targets: Vec<PeerRecord> = s.view.others(s.own_id).cloned().collect();
        (s.own_id, targets)
    });

    output::election(out, format!("node {own_id} is now coordinator"));

    let announcement = Message::CoordinatorAnnouncement {
        coordinator_id: own_id,
    };
    for peer in targets {
        if let Err(err) = direct::send_to(&peer.addr, &announcement).await {
            output::system(out, format!("coordinator announcement to {} failed: {err}", peer.id));
        }
    }
}

/// Emit a `HEARTBEAT` on the multicast channel every `heartbeat_interval`,
/// whenever this node currently holds the coordinator role. Runs for the
/// whole life of the node rather than just while first promoted, since a
/// node that joins as a regular peer can later win an election and must
/// start beaconing at that point; ticks where the node isn't coordinator are
/// simply no-ops.
pub async fn heartbeat_loop(
    state: SharedState,
    config: Config,
    socket: Arc<UdpSocket>,
    mut shutdown: watch::Receiver<bool>,
) {
    let group: Ipv4Addr = config
        .multicast_addr
        .parse()
        .expect("multicast address validated at startup");

    let mut ticker = tokio::time::interval(config.heartbeat_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let (own_id, is_coordinator) = state.with(|s| (s.own_id, s.is_coordinator()));
                if !is_coordinator {
                    continue;
                }
                let msg = Message::Heartbeat { coordinator_id: own_id };
                let _ = multicast::send(&socket, group, config.multicast_port, &msg).await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}
