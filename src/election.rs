//! The Bully election engine: highest identifier always wins.

use crate::coordinator::promote_election_victory;
use crate::membership::NodeId;
use crate::output::{self, Output};
use crate::state::SharedState;
use crate::transport::direct;
use crate::wire::Message;

/// Trigger an election: challenge every higher-identifier peer, then either
/// promote immediately (no challengers) or wait for a concession.
pub async fn start_election(state: &SharedState, election_timeout: std::time::Duration, out: &dyn Output) {
    let (own_id, challengers) = state.with(|s| {
        s.in_election = true;
        (s.own_id, s.view.challengers(s.own_id))
    });

    if challengers.is_empty() {
        promote_election_victory(state, out).await;
        return;
    }

    output::election(out, format!("node {own_id} challenging {} higher peer(s)", challengers.len()));

    let challenge = Message::Election { sender_id: own_id };
    for peer in &challengers {
        if let Err(err) = direct::send_to(&peer.addr, &challenge).await {
            output::system(out, format!("election challenge to {} failed: {err}", peer.id));
        }
    }

    tokio::time::sleep(election_timeout).await;

    let still_electing = state.with(|s| s.in_election);
    if still_electing {
        promote_election_victory(state, out).await;
    }
}

/// Handle an inbound `ELECTION{sender_id}`. Only a node whose id is strictly
/// greater replies and, if it isn't already electing, starts its own.
pub async fn handle_election(
    state: &SharedState,
    sender_id: NodeId,
    election_timeout: std::time::Duration,
    out: &dyn Output,
) {
    let (own_id, reply_addr, already_electing) = state.with(|s| {
        let addr = s.view.get(sender_id).map(|p| p.addr.clone());
        (s.own_id, addr, s.in_election)
    });

    if own_id <= sender_id {
        return;
    }

    if let Some(addr) = reply_addr {
        let ok = Message::ElectionOk { sender_id: own_id };
        if let Err(err) = direct::send_to(&addr, &ok).await {
            output::system(out, format!("election concession reply to {sender_id} failed: {err}"));
        }
    }

    if !already_electing {
        start_election(state, election_timeout, out).await;
    }
}

/// Handle an inbound `ELECTION_OK{sender_id}`: concede, clearing our own
/// election state.
pub fn handle_election_ok(state: &SharedState, sender_id: NodeId, out: &dyn Output) {
    state.with(|s| s.in_election = false);
    output::election(out, format!("conceding to higher peer {sender_id}"));
}

/// Handle an inbound `COORDINATOR_ANNOUNCEMENT{coordinator_id}`. Accepted
/// unconditionally, no epoch or versioning check.
pub fn handle_coordinator_announcement(state: &SharedState, coordinator_id: NodeId, out: &dyn Output) {
    state.with(|s| {
        s.coordinator_id = coordinator_id;
        s.in_election = false;
        s.record_heartbeat();
    });
    output::election(out, format!("node {coordinator_id} is now coordinator"));
}
