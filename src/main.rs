//! Entry point: parse configuration, resolve a nickname, and run the node
//! until it shuts down.

mod chat;
mod config;
mod coordinator;
mod dispatcher;
mod election;
mod failure_detector;
mod membership;
mod node;
mod output;
mod state;
mod transport;
mod wire;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use rand::Rng;
use tokio::io::AsyncBufReadExt;

use config::{Cli, Config};
use node::Node;
use output::StdioOutput;

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(err) = run().await {
        eprintln!("[System] fatal: {err:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let nickname = match &cli.nickname {
        Some(nickname) if !nickname.trim().is_empty() => nickname.trim().to_string(),
        _ => prompt_nickname().await?,
    };
    let config = Config::from_cli(&cli, nickname);

    let out: Arc<dyn output::Output> = Arc::new(StdioOutput);
    let node = Node::bootstrap_or_join(config, out).await?;
    node.run().await
}

/// Read one line from stdin as the nickname; empty input falls back to
/// `User_NNN` with three random decimal digits, per the terminal interface.
async fn prompt_nickname() -> Result<String> {
    println!("[System] choose a nickname (leave blank for a random one):");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let typed = lines.next_line().await?.unwrap_or_default();
    let trimmed = typed.trim();
    if trimmed.is_empty() {
        let suffix: u32 = rand::rng().random_range(0..1000);
        Ok(format!("User_{suffix:03}"))
    } else {
        Ok(trimmed.to_string())
    }
}
