//! Configuration: compile-time protocol defaults, overridable from the CLI.

use std::time::Duration;

use clap::Parser;

pub const DEFAULT_MULTICAST_ADDR: &str = "224.1.1.1";
pub const DEFAULT_MULTICAST_PORT: u16 = 5007;
pub const DEFAULT_TCP_PORT_BASE: u16 = 10000;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_ELECTION_TIMEOUT_SECS: u64 = 5;

/// A fully decentralized, multicast-discovered group chat overlay.
#[derive(Debug, Parser)]
#[command(name = "overlay-chat", version, about)]
pub struct Cli {
    /// Multicast group address used for peer discovery and heartbeats.
    #[arg(long, default_value_t = DEFAULT_MULTICAST_ADDR.to_string())]
    pub multicast_addr: String,

    /// UDP port the multicast group listens on.
    #[arg(long, default_value_t = DEFAULT_MULTICAST_PORT)]
    pub multicast_port: u16,

    /// First TCP port tried when binding the direct control/chat listener.
    /// If it's in use, the bind is retried on the next few ports.
    #[arg(long, default_value_t = DEFAULT_TCP_PORT_BASE)]
    pub tcp_port_base: u16,

    /// Seconds between the coordinator's heartbeat broadcasts.
    #[arg(long, default_value_t = DEFAULT_HEARTBEAT_INTERVAL_SECS)]
    pub heartbeat_interval: u64,

    /// Seconds of heartbeat silence before a non-coordinator assumes the
    /// coordinator is gone and starts an election.
    #[arg(long, default_value_t = DEFAULT_HEARTBEAT_TIMEOUT_SECS)]
    pub heartbeat_timeout: u64,

    /// Seconds a challenger waits for an `ELECTION_OK` before self-promoting.
    #[arg(long, default_value_t = DEFAULT_ELECTION_TIMEOUT_SECS)]
    pub election_timeout: u64,

    /// Display name shown to other peers. If omitted, you're prompted for one.
    #[arg(long)]
    pub nickname: Option<String>,
}

/// Resolved configuration values, in the units the rest of the crate wants.
#[derive(Debug, Clone)]
pub struct Config {
    pub multicast_addr: String,
    pub multicast_port: u16,
    pub tcp_port_base: u16,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub election_timeout: Duration,
    pub nickname: String,
}

impl Config {
    pub fn from_cli(cli: &Cli, nickname: String) -> Self {
        Self {
            multicast_addr: cli.multicast_addr.clone(),
            multicast_port: cli.multicast_port,
            tcp_port_base: cli.tcp_port_base,
            heartbeat_interval: Duration::from_secs(cli.heartbeat_interval),
            heartbeat_timeout: Duration::from_secs(cli.heartbeat_timeout),
            election_timeout: Duration::from_secs(cli.election_timeout),
            nickname,
        }
    }
}
