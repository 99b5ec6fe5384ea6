//! Adapters Layer
//!
//! Channel implementations for the outbound port.
//! - `MemoryChannel`: connected in-process pair driven by tokio tasks
//! - `RecordingChannel`: captures outbound messages, delivers inbound by hand

pub mod memory_channel;
pub mod recording;

pub use memory_channel::MemoryChannel;
pub use recording::RecordingChannel;
