//! Ports Layer
//!
//! Defines the interfaces (traits) for:
//! - Driving Ports (inbound) - what a transport calls into
//! - Driven Ports (outbound) - the transport Graphwire sends through

pub mod inbound;
pub mod outbound;

pub use inbound::{InboundCallHandler, MessageSink};
pub use outbound::Channel;
