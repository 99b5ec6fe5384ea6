//! Handler Layer
//!
//! Inbound side of a peer: the dispatcher that routes every received
//! message, and the responder that serves calls from registered methods.

pub mod dispatcher;
pub mod responder;

pub use dispatcher::{DispatchOutcome, InboundDispatcher};
pub use responder::{FnHandler, MethodHandler, MethodTable, Responder};
