//! The direct TCP channel: one-shot unicast messages between two peers.
//!
//! Every direct exchange is connect, write one encoded message, close. The
//! receiving side accepts the connection and reads it to EOF before
//! decoding — the closed connection *is* the frame delimiter, so there is no
//! length prefix on the wire.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::membership::NetAddr;
use crate::wire::Message;

/// Resolve a peer's advertised `(host, port)` to a concrete socket address.
/// Peers are almost always addressed by IP literal, but we go through
/// `tokio::net::lookup_host` rather than a raw `parse` so a hostname works
/// too.
pub async fn resolve(addr: &NetAddr) -> Result<SocketAddr> {
    tokio::net::lookup_host((addr.host.as_str(), addr.port))
        .await
        .with_context(|| format!("resolving direct peer address {addr}"))?
        .next()
        .with_context(|| format!("no addresses found for {addr}"))
}

/// Resolve and send in one step; the common case for fan-out.
pub async fn send_to(addr: &NetAddr, message: &Message) -> Result<()> {
    let socket_addr = resolve(addr).await?;
    send(socket_addr, message).await
}

/// Width of the randomized direct-port range, `[port_base+100, port_base+999]`.
const PORT_RANGE_LOW: u16 = 100;
const PORT_RANGE_HIGH: u16 = 999;

/// How many freshly-chosen random ports to try before giving up on binding
/// the direct channel listener.
const BIND_RETRY_ATTEMPTS: u32 = 20;

/// Bind a TCP listener to a uniformly random port in
/// `[port_base+100, port_base+999]`. On a bind failure (port already taken by
/// another local node) a fresh random port is drawn and retried, up to
/// [`BIND_RETRY_ATTEMPTS`] times, before reporting a lifecycle error.
pub async fn bind_with_retry(port_base: u16) -> Result<(TcpListener, u16)> {
    let mut last_err = None;
    for _ in 0..BIND_RETRY_ATTEMPTS {
        let port = port_base.saturating_add(rand::rng().random_range(PORT_RANGE_LOW..=PORT_RANGE_HIGH));
        match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => return Ok((listener, port)),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.expect("at least one bind attempt")).with_context(|| {
        format!("could not bind a direct-channel TCP port in range starting from {port_base}")
    })
}

/// Connect to `addr`, write one encoded message, and close the connection.
pub async fn send(addr: SocketAddr, message: &Message) -> Result<()> {
    let bytes = message.encode()?;
    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("connecting to direct peer at {addr}"))?;
    stream.write_all(&bytes).await.context("writing direct message")?;
    stream.shutdown().await.context("closing direct connection")?;
    Ok(())
}

/// Read one accepted connection to EOF and decode the single message it
/// carried.
pub async fn recv_one(stream: &mut TcpStream) -> Result<Message> {
    let mut buf = Vec::new();
    stream
        .read_to_end(&mut buf)
        .await
        .context("reading direct connection to EOF")?;
    Message::decode(&buf)
}
