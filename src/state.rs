//! Shared mutable state: the single lock every concurrent task reads or
//! mutates through.
//!
//! Critical sections here are always synchronous (a map lookup, a insert,
//! a comparison) and never hold the lock across an `.await` — so a plain
//! `std::sync::Mutex` is the right tool, not `tokio::sync::Mutex`. Holding a
//! std mutex guard across an await point would be a bug (it can deadlock the
//! executor); we simply never do it.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::membership::{MembershipView, NodeId, PeerRecord, UNASSIGNED};

/// Everything one running node knows about itself and the overlay.
#[derive(Debug)]
pub struct NodeState {
    pub own_id: NodeId,
    pub coordinator_id: NodeId,
    pub view: MembershipView,
    pub last_heartbeat: Instant,
    pub in_election: bool,
    pub history: Vec<String>,
    pub nickname: String,
    pub tcp_port: u16,
    pub host: String,
}

impl NodeState {
    pub fn new(nickname: String, host: String, tcp_port: u16) -> Self {
        Self {
            own_id: UNASSIGNED,
            coordinator_id: UNASSIGNED,
            view: MembershipView::new(),
            last_heartbeat: Instant::now(),
            in_election: false,
            history: Vec::new(),
            nickname,
            tcp_port,
            host,
        }
    }

    pub fn is_coordinator(&self) -> bool {
        self.own_id.is_assigned() && self.own_id == self.coordinator_id
    }

    pub fn self_record(&self) -> PeerRecord {
        PeerRecord {
            id: self.own_id,
            addr: crate::membership::NetAddr::new(self.host.clone(), self.tcp_port),
            nickname: self.nickname.clone(),
        }
    }

    pub fn record_heartbeat(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    pub fn heartbeat_is_stale(&self, timeout: std::time::Duration) -> bool {
        self.last_heartbeat.elapsed() >= timeout
    }

    pub fn push_history(&mut self, line: String) {
        self.history.push(line);
    }
}

/// A handle to the node's state, cheaply cloned and shared across tasks.
#[derive(Debug, Clone)]
pub struct SharedState(Arc<Mutex<NodeState>>);

impl SharedState {
    pub fn new(state: NodeState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Run a closure against the locked state. Keep these short: no `.await`
    /// may occur while the guard returned inside is held.
    pub fn with<R>(&self, f: impl FnOnce(&mut NodeState) -> R) -> R {
        let mut guard = self.0.lock().expect("node state mutex poisoned");
        f(&mut guard)
    }
}
