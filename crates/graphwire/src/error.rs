//! Error types for the Graphwire RPC substrate.

use std::time::Duration;
use thiserror::Error;

use crate::domain::correlation::CorrelationId;

/// Errors raised while encoding or decoding the wire format.
///
/// Every variant except `Untransmittable` and `ArgumentCount` indicates that
/// the byte stream is desynchronized; the current decode must be abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("Unknown object tag: {0:#04x}")]
    UnknownTag(u8),

    #[error("Invalid boolean byte: {0:#04x}")]
    InvalidBool(u8),

    #[error("Negative length or count: {0}")]
    NegativeLength(i32),

    #[error("Length {len} exceeds limit {max}")]
    LengthLimit { len: usize, max: usize },

    #[error("Invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("Untransmittable object of type {type_name}")]
    Untransmittable { type_name: String },

    #[error("Unknown type: {type_name}")]
    UnknownType { type_name: String },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Pointer index {index} outside registry of {len} entries")]
    DanglingPointer { index: i32, len: usize },

    #[error("Invalid array shape: {0}")]
    InvalidArray(String),

    #[error("Nesting depth exceeds limit {max}")]
    DepthExceeded { max: usize },

    #[error("Argument count mismatch: expected {expected}, found {found}")]
    ArgumentCount { expected: usize, found: usize },
}

/// Errors reported by a channel implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("Channel closed")]
    Closed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Message sink already installed")]
    SinkAlreadySet,

    #[error("No async runtime available to drive the channel")]
    NoRuntime,
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid {field}: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

/// Error returned by a registered method handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Call-level errors surfaced to the caller.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Call to {method} ({correlation_id}) timed out after {after:?}")]
    Timeout {
        method: String,
        correlation_id: CorrelationId,
        after: Duration,
    },

    #[error("Method {method} returns a value and cannot be sent as a notification")]
    ReplyExpected { method: String },
}

impl RpcError {
    /// True when the call never reached the wire.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            RpcError::Codec(CodecError::Untransmittable { .. })
                | RpcError::Codec(CodecError::ArgumentCount { .. })
                | RpcError::Channel(_)
                | RpcError::Config(_)
                | RpcError::ReplyExpected { .. }
        )
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
