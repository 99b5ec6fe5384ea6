//! Service Layer
//!
//! Contains the application services that orchestrate domain logic
//! and coordinate with the transport via ports.

pub mod caller;
pub mod peer;

pub use caller::RpcCaller;
pub use peer::Peer;
