//! Domain types for Graphwire.
//!
//! Wire primitives, the type-signature and object-graph codecs, call
//! envelopes, configuration, and the correlation table with its completion
//! slots. Nothing here performs I/O.

pub mod config;
pub mod correlation;
pub mod envelope;
pub mod graph;
pub mod pending;
pub mod slot;
pub mod transmittable;
pub mod type_tree;
pub mod types;
pub mod value;
pub mod wire;

// Re-exports for convenience
pub use config::{RegistryScope, RpcConfig, RpcConfigBuilder};
pub use correlation::CorrelationId;
pub use envelope::{
    read_correlation, read_header, write_correlation, write_header, CallCodec, CallHeader,
    MethodSignature,
};
pub use graph::{
    check_assignable, CodecLimits, GraphCodec, MaterializedRegistry, VisitedRegistry,
    DEFAULT_MAX_VALUE_DEPTH,
};
pub use pending::{cleanup_task, CallCorrelationTable, PendingStats, PendingStatsSnapshot};
pub use slot::CompletionSlot;
pub use transmittable::Transmittable;
pub use type_tree::{names, TypeTree};
pub use types::{BlobCodec, FieldDescriptor, TypeDescriptor, TypeRegistry};
pub use value::{ArrayRef, ArrayValue, Bound, Object, ObjectRef, Value};
pub use wire::{ObjectTag, WireReader, WireWriter};
