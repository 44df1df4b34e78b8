//! UDP multicast: the channel peers use to discover each other and to
//! receive the coordinator's heartbeats and election broadcasts.
//!
//! `tokio::net::UdpSocket` has no API for joining a multicast group or
//! setting `SO_REUSEADDR`, so we build the socket with `socket2` (which
//! exposes those `setsockopt` calls directly) and hand the resulting file
//! descriptor to tokio afterwards.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::wire::Message;

/// Bind a UDP socket on `port`, join the multicast group at `group_addr`, and
/// set `SO_REUSEADDR` so multiple nodes on the same host can share the port.
pub fn bind(group_addr: Ipv4Addr, port: u16) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .context("creating multicast UDP socket")?;

    socket
        .set_reuse_address(true)
        .context("setting SO_REUSEADDR")?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    socket
        .bind(&bind_addr.into())
        .with_context(|| format!("binding multicast socket to port {port}"))?;

    socket
        .join_multicast_v4(&group_addr, &Ipv4Addr::UNSPECIFIED)
        .with_context(|| format!("joining multicast group {group_addr}"))?;

    socket.set_nonblocking(true).context("setting socket nonblocking")?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).context("handing multicast socket to tokio")
}

/// Send a message to the multicast group. Encoding failures never happen in
/// practice (see [`Message::encode`]); transport failures are the caller's to
/// decide whether to ignore, per the swallow-and-continue policy for
/// discovery traffic.
pub async fn send(socket: &UdpSocket, group_addr: Ipv4Addr, port: u16, message: &Message) -> Result<()> {
    let bytes = message.encode()?;
    let target = SocketAddr::V4(SocketAddrV4::new(group_addr, port));
    socket.send_to(&bytes, target).await.context("sending multicast datagram")?;
    Ok(())
}

/// Receive and decode one datagram. Returns the sender's address alongside
/// the decoded message; a malformed datagram is returned as an `Err` for the
/// dispatcher to discard.
pub async fn recv(socket: &UdpSocket, buf: &mut [u8]) -> Result<(SocketAddr, Result<Message>)> {
    let (len, from) = socket.recv_from(buf).await.context("receiving multicast datagram")?;
    Ok((from, Message::decode(&buf[..len])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::NodeId;

    #[tokio::test]
    async fn bind_send_and_receive_a_loopback_multicast_datagram() {
        let group: Ipv4Addr = "224.1.1.1".parse().unwrap();
        let port = 15007;

        let receiver = bind(group, port).expect("bind receiver");
        let sender = bind(group, port).expect("bind sender sharing the port");

        let msg = Message::Heartbeat {
            coordinator_id: NodeId(9),
        };
        send(&sender, group, port, &msg).await.expect("send");

        let mut buf = [0u8; 4096];
        let (_from, decoded) = recv(&receiver, &mut buf).await.expect("recv");
        match decoded.expect("decode") {
            Message::Heartbeat { coordinator_id } => assert_eq!(coordinator_id, NodeId(9)),
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
