//! The node orchestrator: wires the transports, the shared state, and every
//! long-lived concurrent activity together, and runs until shutdown.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::chat;
use crate::config::Config;
use crate::coordinator;
use crate::dispatcher;
use crate::failure_detector;
use crate::membership::UNASSIGNED;
use crate::output::{self, SharedOutput};
use crate::state::{NodeState, SharedState};
use crate::transport::{direct, multicast};
use crate::wire::Message;

pub struct Node {
    config: Config,
    state: SharedState,
    multicast_socket: Arc<UdpSocket>,
    out: SharedOutput,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    accept_handle: JoinHandle<()>,
}

impl Node {
    /// Bind the transports and run the `DISCOVERING` join protocol: announce
    /// on multicast, and either adopt an identifier from a `JOIN_RESPONSE` or
    /// self-promote as the overlay's first node once `election_timeout`
    /// elapses with no response.
    ///
    /// The direct-channel accept loop is spawned before the announcement
    /// goes out and kept running for the node's whole lifetime, so a prompt
    /// `JOIN_RESPONSE` is never missed while we're still deciding whether to
    /// self-promote.
    pub async fn bootstrap_or_join(config: Config, out: SharedOutput) -> Result<Self> {
        let group: Ipv4Addr = config
            .multicast_addr
            .parse()
            .with_context(|| format!("invalid multicast address {}", config.multicast_addr))?;

        let multicast_socket = Arc::new(
            multicast::bind(group, config.multicast_port)
                .context("binding multicast discovery socket")?,
        );
        let (tcp_listener, tcp_port) = direct::bind_with_retry(config.tcp_port_base)
            .await
            .context("binding direct-channel TCP listener")?;

        let host = local_host_guess(group, config.multicast_port)
            .unwrap_or_else(|_| "127.0.0.1".to_string());

        let state = SharedState::new(NodeState::new(config.nickname.clone(), host, tcp_port));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let accept_handle = tokio::spawn(accept_loop(
            tcp_listener,
            state.clone(),
            config.clone(),
            out.clone(),
            shutdown_rx.clone(),
        ));

        output::system(out.as_ref(), "looking for an existing overlay...");
        let request = Message::JoinRequest {
            tcp_port,
            nickname: config.nickname.clone(),
        };
        multicast::send(&multicast_socket, group, config.multicast_port, &request)
            .await
            .context("sending initial join request")?;

        tokio::time::sleep(config.election_timeout).await;

        let already_joined = state.with(|s| s.own_id.is_assigned());
        if !already_joined {
            coordinator::promote_bootstrap(&state, out.as_ref());
        }

        Ok(Self {
            config,
            state,
            multicast_socket,
            out,
            shutdown_tx,
            shutdown_rx,
            accept_handle,
        })
    }

    /// Spawn every remaining long-lived activity and run until shutdown is
    /// signalled (Ctrl-C or a user-typed `exit`).
    pub async fn run(self) -> Result<()> {
        let mut handles = vec![self.accept_handle];

        handles.push(tokio::spawn(multicast_loop(
            self.multicast_socket.clone(),
            self.state.clone(),
            self.out.clone(),
            self.shutdown_rx.clone(),
        )));

        handles.push(tokio::spawn(coordinator::heartbeat_loop(
            self.state.clone(),
            self.config.clone(),
            self.multicast_socket.clone(),
            self.shutdown_rx.clone(),
        )));

        handles.push(tokio::spawn(failure_detector::run(
            self.state.clone(),
            self.config.clone(),
            self.out.clone(),
            self.shutdown_rx.clone(),
        )));

        let input_handle = tokio::spawn(user_input_loop(
            self.state.clone(),
            self.out.clone(),
            self.shutdown_tx.clone(),
        ));

        tokio::signal::ctrl_c().await.ok();
        let _ = self.shutdown_tx.send(true);

        let grace = Duration::from_secs(2);
        let _ = tokio::time::timeout(grace, input_handle).await;
        for handle in handles {
            let _ = tokio::time::timeout(grace, handle).await;
        }

        Ok(())
    }
}

/// Discover the local address peers should see us from, by opening a
/// scratch UDP socket and letting the OS pick a route to the multicast
/// group; no packet is actually sent.
fn local_host_guess(group: Ipv4Addr, port: u16) -> Result<String> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0")?;
    socket.connect((group, port))?;
    Ok(socket.local_addr()?.ip().to_string())
}

async fn multicast_loop(
    socket: Arc<UdpSocket>,
    state: SharedState,
    out: SharedOutput,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = [0u8; 8192];
    loop {
        tokio::select! {
            result = multicast::recv(&socket, &mut buf) => {
                if let Ok((from, Ok(message))) = result {
                    dispatcher::handle_multicast(&state, message, from, out.as_ref()).await;
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

async fn accept_loop(
    listener: tokio::net::TcpListener,
    state: SharedState,
    config: Config,
    out: SharedOutput,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                if let Ok((mut stream, _peer)) = accepted {
                    let state = state.clone();
                    let config = config.clone();
                    let out = out.clone();
                    tokio::spawn(async move {
                        if let Ok(message) = direct::recv_one(&mut stream).await {
                            dispatcher::handle_direct(&state, &config, message, out.as_ref()).await;
                        }
                    });
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

async fn user_input_loop(state: SharedState, out: SharedOutput, shutdown_tx: watch::Sender<bool>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            _ => break,
        };

        if line.trim().eq_ignore_ascii_case("exit") {
            leave_network(&state, out.as_ref()).await;
            let _ = shutdown_tx.send(true);
            break;
        }

        if line.trim().is_empty() {
            continue;
        }

        chat::send_chat_message(&state, line, out.as_ref()).await;
    }
}

/// Voluntary leave (§4.9): a non-coordinator tells the coordinator it's
/// departing; the coordinator just stops heartbeating, which the remaining
/// nodes' failure detectors will notice on their own.
async fn leave_network(state: &SharedState, out: &dyn output::Output) {
    let (is_coordinator, own_id, coordinator_addr) = state.with(|s| {
        let addr = s.view.get(s.coordinator_id).map(|p| p.addr.clone());
        (s.is_coordinator(), s.own_id, addr)
    });

    if is_coordinator {
        output::system(out, "leaving the overlay; heartbeats will stop");
        return;
    }

    if own_id == UNASSIGNED {
        return;
    }

    if let Some(addr) = coordinator_addr {
        let msg = Message::LeaveRequest { node_id: own_id };
        let _ = direct::send_to(&addr, &msg).await;
    }
    output::system(out, "left the overlay");
}
