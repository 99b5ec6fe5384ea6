//! Inbound Ports (Driving Ports)
//!
//! The transport hands each complete inbound message to a [`MessageSink`].
//! Messages that are not replies to our own calls go on to an
//! [`InboundCallHandler`].

use bytes::Bytes;

use crate::error::CodecError;

/// Receives every complete inbound message from a channel.
///
/// Called from the transport's delivery context; implementations must not
/// block on a reply of their own.
pub trait MessageSink: Send + Sync {
    fn receive(&self, message: Bytes);
}

/// Handles inbound messages that completed no pending call.
pub trait InboundCallHandler: Send + Sync {
    /// `message` is the whole inbound message, header included.
    ///
    /// An error means the bytes are not a call this handler understands.
    fn handle_call(&self, message: Bytes) -> Result<(), CodecError>;
}
