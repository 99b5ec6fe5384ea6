//! # Graphwire
//!
//! Remote method invocation over an opaque, bidirectional message channel.
//! Arguments and results are arbitrary object graphs, cycles and shared
//! references included, carried in a compact binary format.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure logic, no I/O
//!   - `TypeTree`: Recursive type signature with its wire codec
//!   - `GraphCodec`: Object-graph serializer with back-reference pointers
//!   - `CallCodec`: Call envelope (correlation, method, type lists, arguments)
//!   - `CallCorrelationTable`: Pending calls keyed by correlation id
//!   - `RpcConfig` / `RpcConfigBuilder`: Configuration with validation
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `Channel`: Driven port, the transport
//!   - `MessageSink`, `InboundCallHandler`: Driving ports
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `RpcCaller`: Encodes, correlates and awaits calls
//!   - `Peer`: One connection end with caller, dispatcher and responder wired
//!
//! - **Handler Layer** (`handler/`): Inbound routing
//!   - `InboundDispatcher`: Completes pending calls or routes to the responder
//!   - `Responder`: Serves calls from a `MethodTable`
//!
//! - **Adapters Layer** (`adapters/`): Channel implementations
//!   - `MemoryChannel`: In-process connected pair
//!   - `RecordingChannel`: Captures sends, delivers by hand
//!
//! ## Wire Format
//!
//! All integers are little-endian; strings and byte runs are an `i32`
//! length followed by the bytes. Every value starts with a one-byte tag:
//! `Null`, `Blob`, `Array` or `Pointer`. A pointer is the zero-based index
//! of an object already written in the same registry scope.
//!
//! ## Invariants
//!
//! - Writer and reader assign registry indices in the same order, so a
//!   pointer always names the same object on both sides.
//! - Each correlation id is completed at most once; a late or duplicate
//!   reply is dropped and counted.
//! - A call whose arguments are not transmittable is never sent and never
//!   leaves a pending entry behind.
//!
//! ## Usage Example
//!
//! ```ignore
//! use graphwire::{MemoryChannel, MethodSignature, Peer, RpcConfig, TypeRegistry, TypeTree, Value};
//!
//! let (left, right) = MemoryChannel::pair();
//! let types = Arc::new(TypeRegistry::new());
//! let client = Peer::new(Arc::new(left), types.clone(), RpcConfig::default())?;
//! let server = Peer::new(Arc::new(right), types, RpcConfig::default())?;
//!
//! let double = MethodSignature::new("Double").param(TypeTree::i32()).returns(TypeTree::i32());
//! server.register_fn(double.clone(), |args| Ok(Value::I32(args[0].as_i32().unwrap_or(0) * 2)));
//!
//! assert_eq!(client.call(&double, &[Value::I32(21)]).await?, Value::I32(42));
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{MemoryChannel, RecordingChannel};
pub use domain::{
    check_assignable, names, ArrayRef, ArrayValue, BlobCodec, Bound, CallCodec, CallCorrelationTable,
    CallHeader, CodecLimits, CompletionSlot, CorrelationId, FieldDescriptor, GraphCodec,
    MethodSignature, Object, ObjectRef, ObjectTag, RegistryScope, RpcConfig, RpcConfigBuilder,
    Transmittable, TypeDescriptor, TypeRegistry, TypeTree, Value, WireReader, WireWriter,
};
pub use error::{ChannelError, CodecError, ConfigError, HandlerError, RpcError, RpcResult};
pub use handler::{DispatchOutcome, FnHandler, InboundDispatcher, MethodHandler, MethodTable, Responder};
pub use metrics::{FailureKind, InboundKind, MetricsRecorder, MetricsSnapshot, RpcMetrics};
pub use ports::{Channel, InboundCallHandler, MessageSink};
pub use service::{Peer, RpcCaller};
