//! Outbound Ports (Driven Ports)
//!
//! The only dependency Graphwire has on a transport: a way to send one
//! message and a place to deliver inbound ones. Framing, connection
//! lifecycle and delivery threads belong to the implementation.

use bytes::Bytes;
use std::sync::Arc;

use super::inbound::MessageSink;
use crate::error::ChannelError;

/// Message-oriented, at-most-once transport.
pub trait Channel: Send + Sync {
    /// Transmits one complete message.
    ///
    /// Must not wait for the peer; callers may be inside a blocking call.
    fn send(&self, message: Bytes) -> Result<(), ChannelError>;

    /// Installs the sink for inbound messages. At most one sink per channel.
    fn set_sink(&self, sink: Arc<dyn MessageSink>) -> Result<(), ChannelError>;

    /// Tears the connection down. Later sends fail with `Closed`.
    fn close(&self) {}
}
