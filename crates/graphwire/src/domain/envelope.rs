//! Call and reply envelopes.
//!
//! ```text
//! Call  := HasCorrelation:bool [CorrelationId:uuid]
//!          MethodName:string
//!          GenericArgCount:i32 TypeTree*
//!          ParamCount:i32 TypeTree*
//!          SerializedValue*
//! Reply := HasCorrelation:bool [CorrelationId:uuid] ResultBytes
//! ```
//!
//! Empty `ResultBytes` in a reply means the call was aborted.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::config::{RegistryScope, RpcConfig};
use super::correlation::CorrelationId;
use super::graph::{check_assignable, CodecLimits, GraphCodec, MaterializedRegistry, VisitedRegistry};
use super::type_tree::{read_type_list, write_type_list, TypeTree};
use super::types::TypeRegistry;
use super::value::Value;
use super::wire::{WireReader, WireWriter};
use crate::error::CodecError;

/// Explicit identity of a remote method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: String,
    pub generic_args: Vec<TypeTree>,
    pub params: Vec<TypeTree>,
    pub return_type: TypeTree,
}

impl MethodSignature {
    /// Void method with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generic_args: Vec::new(),
            params: Vec::new(),
            return_type: TypeTree::void(),
        }
    }

    pub fn param(mut self, ty: TypeTree) -> Self {
        self.params.push(ty);
        self
    }

    pub fn generic_arg(mut self, ty: TypeTree) -> Self {
        self.generic_args.push(ty);
        self
    }

    pub fn returns(mut self, ty: TypeTree) -> Self {
        self.return_type = ty;
        self
    }

    /// A non-void method gets a correlation id and a reply.
    pub fn expects_reply(&self) -> bool {
        !self.return_type.is_void()
    }
}

/// Decoded call envelope, arguments excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHeader {
    pub correlation_id: Option<CorrelationId>,
    pub method: String,
    pub generic_args: Vec<TypeTree>,
    pub param_types: Vec<TypeTree>,
}

impl CallHeader {
    /// Header for `signature`, minting an id when a reply is expected.
    pub fn for_signature(signature: &MethodSignature) -> Self {
        Self {
            correlation_id: signature.expects_reply().then(CorrelationId::new),
            method: signature.name.clone(),
            generic_args: signature.generic_args.clone(),
            param_types: signature.params.clone(),
        }
    }

    pub fn write(&self, writer: &mut WireWriter) {
        write_correlation(self.correlation_id, writer);
        writer.write_str(&self.method);
        write_type_list(&self.generic_args, writer);
        write_type_list(&self.param_types, writer);
    }

    pub fn read(reader: &mut WireReader, max_type_depth: usize) -> Result<Self, CodecError> {
        let correlation_id = read_correlation(reader)?;
        let method = reader.read_str()?;
        let generic_args = read_type_list(reader, max_type_depth)?;
        let param_types = read_type_list(reader, max_type_depth)?;
        Ok(Self {
            correlation_id,
            method,
            generic_args,
            param_types,
        })
    }
}

/// Writes the header for `signature` and returns the minted id, if any.
pub fn write_header(signature: &MethodSignature, writer: &mut WireWriter) -> Option<CorrelationId> {
    let header = CallHeader::for_signature(signature);
    header.write(writer);
    header.correlation_id
}

/// Reads a call header.
pub fn read_header(reader: &mut WireReader, max_type_depth: usize) -> Result<CallHeader, CodecError> {
    CallHeader::read(reader, max_type_depth)
}

/// `HasCorrelation` flag followed by the id when present.
pub fn write_correlation(id: Option<CorrelationId>, writer: &mut WireWriter) {
    match id {
        Some(id) => {
            writer.write_bool(true);
            writer.write_uuid(id.as_bytes());
        }
        None => writer.write_bool(false),
    }
}

pub fn read_correlation(reader: &mut WireReader) -> Result<Option<CorrelationId>, CodecError> {
    if reader.read_bool()? {
        Ok(Some(CorrelationId::from_bytes(reader.read_uuid()?)))
    } else {
        Ok(None)
    }
}

/// Builds and parses whole call and reply messages.
#[derive(Debug, Clone)]
pub struct CallCodec {
    graph: GraphCodec,
    scope: RegistryScope,
}

impl CallCodec {
    pub fn new(graph: GraphCodec, scope: RegistryScope) -> Self {
        Self { graph, scope }
    }

    pub fn from_config(types: Arc<TypeRegistry>, config: &RpcConfig) -> Self {
        Self::new(GraphCodec::new(types, config.limits()), config.registry_scope)
    }

    pub fn graph(&self) -> &GraphCodec {
        &self.graph
    }

    pub fn scope(&self) -> RegistryScope {
        self.scope
    }

    pub fn limits(&self) -> CodecLimits {
        self.graph.limits()
    }

    pub fn reader(&self, bytes: Bytes) -> WireReader {
        self.graph.reader(bytes)
    }

    /// Encodes a complete call message.
    ///
    /// Nothing is returned unless every argument encoded, so a rejected
    /// value never reaches the channel.
    pub fn encode_call(
        &self,
        signature: &MethodSignature,
        args: &[Value],
    ) -> Result<(Option<CorrelationId>, Bytes), CodecError> {
        if args.len() != signature.params.len() {
            return Err(CodecError::ArgumentCount {
                expected: signature.params.len(),
                found: args.len(),
            });
        }
        let mut writer = WireWriter::with_capacity(64);
        let id = write_header(signature, &mut writer);
        self.write_args(&signature.params, args, &mut writer)?;
        Ok((id, writer.into_bytes()))
    }

    /// Serializes arguments in declared order.
    pub fn write_args(
        &self,
        params: &[TypeTree],
        args: &[Value],
        writer: &mut WireWriter,
    ) -> Result<(), CodecError> {
        if args.len() != params.len() {
            return Err(CodecError::ArgumentCount {
                expected: params.len(),
                found: args.len(),
            });
        }
        let mut shared = VisitedRegistry::new();
        for (arg, param) in args.iter().zip(params) {
            check_assignable(arg, param)?;
            match self.scope {
                RegistryScope::PerArgument => {
                    self.graph.serialize(arg, writer, &mut VisitedRegistry::new())?
                }
                RegistryScope::PerCall => self.graph.serialize(arg, writer, &mut shared)?,
            }
        }
        Ok(())
    }

    pub fn read_header(&self, reader: &mut WireReader) -> Result<CallHeader, CodecError> {
        CallHeader::read(reader, self.graph.limits().max_type_depth)
    }

    /// Deserializes one argument per parameter type.
    pub fn read_args(&self, params: &[TypeTree], reader: &mut WireReader) -> Result<Vec<Value>, CodecError> {
        let mut shared = MaterializedRegistry::new();
        let mut args = Vec::with_capacity(params.len());
        for param in params {
            let value = match self.scope {
                RegistryScope::PerArgument => {
                    self.graph
                        .deserialize(param, reader, &mut MaterializedRegistry::new())?
                }
                RegistryScope::PerCall => self.graph.deserialize(param, reader, &mut shared)?,
            };
            args.push(value);
        }
        Ok(args)
    }

    /// Encodes a reply. `None` produces the abort sentinel (no result bytes).
    pub fn encode_reply(&self, id: CorrelationId, result: Option<&Value>) -> Result<Bytes, CodecError> {
        let mut writer = WireWriter::with_capacity(32);
        write_correlation(Some(id), &mut writer);
        if let Some(value) = result {
            self.graph.serialize(value, &mut writer, &mut VisitedRegistry::new())?;
        }
        Ok(writer.into_bytes())
    }

    /// Decodes completed result bytes against the return type captured at
    /// call time. Empty bytes yield the type's default value.
    pub fn decode_result(&self, return_type: &TypeTree, bytes: Bytes) -> Result<Value, CodecError> {
        if bytes.is_empty() || return_type.is_void() {
            return Ok(self.default_value(return_type));
        }
        self.graph.decode_value(return_type, bytes)
    }

    pub fn default_value(&self, ty: &TypeTree) -> Value {
        self.graph.types().default_value(ty)
    }
}
