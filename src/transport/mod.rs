//! Network transports: the multicast discovery/control channel and the
//! direct, one-shot TCP channel used for unicast control and chat traffic.

pub mod direct;
pub mod multicast;
