//! The failure detector: watches for a stale coordinator heartbeat and
//! triggers an election.

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::election;
use crate::output::SharedOutput;
use crate::state::SharedState;

/// Runs until told to shut down. Every `heartbeat_timeout`, checks whether
/// the coordinator's last heartbeat is stale and, if so and no election is
/// already underway, starts one.
pub async fn run(
    state: SharedState,
    config: Config,
    out: SharedOutput,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(config.heartbeat_timeout);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let should_elect = state.with(|s| {
                    if s.is_coordinator() || !s.own_id.is_assigned() || s.in_election {
                        return false;
                    }
                    s.heartbeat_is_stale(config.heartbeat_timeout)
                });
                if should_elect {
                    election::start_election(&state, config.election_timeout, out.as_ref()).await;
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}
