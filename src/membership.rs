//! The membership view: the authoritative table of known peers.
//!
//! A node's view maps node identifiers to peer records. It is mutated only
//! by the dispatcher — either a coordinator admitting a new peer, or any
//! node replacing its view wholesale on `JOIN_RESPONSE`/`PEER_UPDATE`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A node identifier. `0` means "unassigned" — see [`UNASSIGNED`].
///
/// Identifiers are totally ordered and that order is election precedence:
/// the higher `NodeId` always wins a Bully challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Sentinel value meaning "no identifier assigned yet".
pub const UNASSIGNED: NodeId = NodeId(0);

impl NodeId {
    pub fn is_assigned(self) -> bool {
        self != UNASSIGNED
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A peer's network address: the host it was observed from, and the TCP
/// port it advertised in its `JOIN_REQUEST`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetAddr {
    pub host: String,
    pub port: u16,
}

impl NetAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One entry in the membership view: who a peer is, where to reach them,
/// and the display name they chose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub id: NodeId,
    pub addr: NetAddr,
    pub nickname: String,
}

/// The node's local snapshot of the overlay's participants.
///
/// `BTreeMap` keeps entries ordered by identifier — useful for deterministic
/// iteration (e.g. computing challengers in ascending order) and for
/// producing consistent JSON output (`serde_json` serializes a `BTreeMap` in
/// key order).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MembershipView(pub BTreeMap<NodeId, PeerRecord>);

impl MembershipView {
    pub fn new() -> Self {
        Self::default()
    }

    /// The identifier the coordinator would assign to a new joiner: one past
    /// the highest identifier currently present, or `1` if the view is empty.
    ///
    /// This is computed fresh from the view every time rather than tracked as
    /// a separate counter, so it stays correct even if entries are later
    /// removed (a `LEAVE_REQUEST` departure does not reuse the departed id).
    pub fn next_id(&self) -> NodeId {
        match self.0.keys().max() {
            Some(NodeId(max)) => NodeId(max + 1),
            None => NodeId(1),
        }
    }

    pub fn insert(&mut self, record: PeerRecord) {
        self.0.insert(record.id, record);
    }

    pub fn remove(&mut self, id: NodeId) -> Option<PeerRecord> {
        self.0.remove(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&PeerRecord> {
        self.0.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.0.contains_key(&id)
    }

    /// Peers with a strictly higher identifier than `self_id` — the set a
    /// Bully election challenges.
    pub fn challengers(&self, self_id: NodeId) -> Vec<PeerRecord> {
        self.0
            .values()
            .filter(|p| p.id > self_id)
            .cloned()
            .collect()
    }

    /// Every peer except `self_id` — the fan-out set for `PEER_UPDATE`,
    /// `COORDINATOR_ANNOUNCEMENT`, and chat broadcast.
    pub fn others(&self, self_id: NodeId) -> impl Iterator<Item = &PeerRecord> {
        self.0.values().filter(move |p| p.id != self_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, port: u16, nickname: &str) -> PeerRecord {
        PeerRecord {
            id: NodeId(id),
            addr: NetAddr::new("127.0.0.1", port),
            nickname: nickname.to_string(),
        }
    }

    #[test]
    fn next_id_is_one_when_empty() {
        let view = MembershipView::new();
        assert_eq!(view.next_id(), NodeId(1));
    }

    #[test]
    fn next_id_is_one_past_the_max() {
        let mut view = MembershipView::new();
        view.insert(record(1, 10001, "a"));
        view.insert(record(3, 10002, "c"));
        assert_eq!(view.next_id(), NodeId(4));
    }

    #[test]
    fn next_id_does_not_reuse_departed_ids() {
        let mut view = MembershipView::new();
        view.insert(record(1, 10001, "a"));
        view.insert(record(2, 10002, "b"));
        view.remove(NodeId(2));
        assert_eq!(view.next_id(), NodeId(3));
    }

    #[test]
    fn challengers_are_strictly_higher_ids() {
        let mut view = MembershipView::new();
        view.insert(record(1, 10001, "a"));
        view.insert(record(2, 10002, "b"));
        view.insert(record(3, 10003, "c"));
        let challengers: Vec<NodeId> = view.challengers(NodeId(2)).iter().map(|p| p.id).collect();
        assert_eq!(challengers, vec![NodeId(3)]);
    }

    #[test]
    fn others_excludes_self() {
        let mut view = MembershipView::new();
        view.insert(record(1, 10001, "a"));
        view.insert(record(2, 10002, "b"));
        let others: Vec<NodeId> = view.others(NodeId(1)).map(|p| p.id).collect();
        assert_eq!(others, vec![NodeId(2)]);
    }

    #[test]
    fn unassigned_sentinel_is_not_assigned() {
        assert!(!UNASSIGNED.is_assigned());
        assert!(NodeId(1).is_assigned());
    }
}
