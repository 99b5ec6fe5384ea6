//! Object-graph codec.
//!
//! Serializes a [`Value`] into the tagged stream and back. Shared and cyclic
//! references are written once and referenced afterwards by `Pointer` tags
//! carrying the index of the earlier occurrence in the visited registry.
//!
//! Registry slot order is what keeps both sides aligned:
//!
//! - arrays and composites take their slot before any nested value,
//! - every blob takes exactly one slot, reserved before its codec runs on
//!   encode and pushed after it runs on decode (blob codecs never nest),
//! - `Null` and `Pointer` never take a slot.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;

use super::type_tree::TypeTree;
use super::types::{TypeDescriptor, TypeRegistry};
use super::value::{shape_len, ArrayRef, ArrayValue, Bound, Object, ObjectRef, Value};
use super::wire::{ObjectTag, WireReader, WireWriter, DEFAULT_MAX_COLLECTION_LEN};
use crate::error::CodecError;

/// Highest array rank accepted on decode.
pub const MAX_ARRAY_RANK: usize = 32;

/// Default value nesting limit. Decoding recurses once per level, so this
/// must fit a 2 MiB thread stack in unoptimized builds.
pub const DEFAULT_MAX_VALUE_DEPTH: usize = 256;

/// Decoding and encoding limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecLimits {
    /// Maximum nesting of a type signature.
    pub max_type_depth: usize,
    /// Maximum nesting of a serialized value.
    pub max_value_depth: usize,
    /// Maximum length or element count of any collection.
    pub max_collection_len: usize,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_type_depth: 64,
            max_value_depth: DEFAULT_MAX_VALUE_DEPTH,
            max_collection_len: DEFAULT_MAX_COLLECTION_LEN,
        }
    }
}

/// Encode-side registry: object identity to slot index.
///
/// Handles are kept alive for the registry's lifetime so an address can
/// never be reused by a different object mid-encode.
#[derive(Debug, Default)]
pub struct VisitedRegistry {
    slots: HashMap<usize, i32>,
    held: Vec<Value>,
    next: i32,
}

impl VisitedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot of a previously registered handle.
    pub fn lookup(&self, value: &Value) -> Option<i32> {
        value.identity().and_then(|id| self.slots.get(&id).copied())
    }

    /// Takes the next slot, recording identity for handles.
    pub fn register(&mut self, value: &Value) -> i32 {
        let index = self.next;
        self.next += 1;
        if let Some(id) = value.identity() {
            self.slots.insert(id, index);
            self.held.push(value.clone());
        }
        index
    }

    /// Number of slots taken.
    pub fn len(&self) -> usize {
        usize::try_from(self.next).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.next == 0
    }
}

/// Decode-side registry: values in materialization order.
#[derive(Debug, Default)]
pub struct MaterializedRegistry {
    entries: Vec<Value>,
}

impl MaterializedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Value) -> usize {
        self.entries.push(value);
        self.entries.len() - 1
    }

    pub fn get(&self, index: i32) -> Result<Value, CodecError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.entries.get(i))
            .cloned()
            .ok_or(CodecError::DanglingPointer {
                index,
                len: self.entries.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Recursive serializer/deserializer bound to a type registry.
#[derive(Debug, Clone)]
pub struct GraphCodec {
    types: Arc<TypeRegistry>,
    limits: CodecLimits,
}

impl GraphCodec {
    pub fn new(types: Arc<TypeRegistry>, limits: CodecLimits) -> Self {
        Self { types, limits }
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    pub fn limits(&self) -> CodecLimits {
        self.limits
    }

    /// Reader honoring this codec's collection limit.
    pub fn reader(&self, bytes: Bytes) -> WireReader {
        WireReader::with_limit(bytes, self.limits.max_collection_len)
    }

    /// Encodes one value with a fresh registry.
    pub fn encode_value(&self, value: &Value) -> Result<Bytes, CodecError> {
        let mut writer = WireWriter::new();
        self.serialize(value, &mut writer, &mut VisitedRegistry::new())?;
        Ok(writer.into_bytes())
    }

    /// Decodes one value of `target` with a fresh registry.
    pub fn decode_value(&self, target: &TypeTree, bytes: Bytes) -> Result<Value, CodecError> {
        let mut reader = self.reader(bytes);
        self.deserialize(target, &mut reader, &mut MaterializedRegistry::new())
    }

    /// Writes `value` and everything reachable from it.
    pub fn serialize(
        &self,
        value: &Value,
        writer: &mut WireWriter,
        registry: &mut VisitedRegistry,
    ) -> Result<(), CodecError> {
        self.serialize_at(value, writer, registry, 0)
    }

    fn serialize_at(
        &self,
        value: &Value,
        writer: &mut WireWriter,
        registry: &mut VisitedRegistry,
        depth: usize,
    ) -> Result<(), CodecError> {
        if depth > self.limits.max_value_depth {
            return Err(CodecError::DepthExceeded {
                max: self.limits.max_value_depth,
            });
        }

        if value.is_null() {
            writer.write_tag(ObjectTag::Null);
            return Ok(());
        }

        if let Some(index) = registry.lookup(value) {
            writer.write_tag(ObjectTag::Pointer);
            writer.write_i32(index);
            return Ok(());
        }

        if let Value::Array(array) = value {
            registry.register(value);
            return self.serialize_array(array, writer, registry, depth);
        }

        let type_name = value.type_name();
        match self.types.descriptor(&type_name) {
            Some(TypeDescriptor::Blob(codec)) => {
                registry.register(value);
                writer.write_tag(ObjectTag::Blob);
                codec.encode(value, writer)
            }
            Some(TypeDescriptor::Composite(fields)) if !fields.is_empty() => {
                let Value::Object(object) = value else {
                    return Err(CodecError::Untransmittable { type_name });
                };
                registry.register(value);
                writer.write_tag(ObjectTag::Blob);
                // Snapshot so no lock is held while recursing.
                let field_values: Vec<Value> = {
                    let guard = object.read();
                    fields
                        .iter()
                        .map(|f| guard.get(&f.name).cloned().unwrap_or_default())
                        .collect()
                };
                for (field, field_value) in fields.iter().zip(&field_values) {
                    check_assignable(field_value, &field.ty)?;
                    self.serialize_at(field_value, writer, registry, depth + 1)?;
                }
                Ok(())
            }
            _ => Err(CodecError::Untransmittable { type_name }),
        }
    }

    fn serialize_array(
        &self,
        array: &ArrayRef,
        writer: &mut WireWriter,
        registry: &mut VisitedRegistry,
        depth: usize,
    ) -> Result<(), CodecError> {
        let (element_type, bounds, elements) = {
            let guard = array.read();
            (
                guard.element_type().clone(),
                guard.bounds().to_vec(),
                guard.elements().to_vec(),
            )
        };
        writer.write_tag(ObjectTag::Array);
        writer.write_len(bounds.len());
        for bound in &bounds {
            writer.write_i32(bound.lower);
            writer.write_i32(bound.upper);
        }
        for element in &elements {
            check_assignable(element, &element_type)?;
            self.serialize_at(element, writer, registry, depth + 1)?;
        }
        Ok(())
    }

    /// Reads one value of type `target`.
    pub fn deserialize(
        &self,
        target: &TypeTree,
        reader: &mut WireReader,
        registry: &mut MaterializedRegistry,
    ) -> Result<Value, CodecError> {
        self.deserialize_at(target, reader, registry, 0)
    }

    fn deserialize_at(
        &self,
        target: &TypeTree,
        reader: &mut WireReader,
        registry: &mut MaterializedRegistry,
        depth: usize,
    ) -> Result<Value, CodecError> {
        if depth > self.limits.max_value_depth {
            return Err(CodecError::DepthExceeded {
                max: self.limits.max_value_depth,
            });
        }

        match reader.read_tag()? {
            ObjectTag::Null => Ok(self.types.default_value(target)),
            ObjectTag::Pointer => registry.get(reader.read_i32()?),
            ObjectTag::Array => self.deserialize_array(target, reader, registry, depth),
            ObjectTag::Blob => self.deserialize_blob(target, reader, registry, depth),
        }
    }

    fn deserialize_array(
        &self,
        target: &TypeTree,
        reader: &mut WireReader,
        registry: &mut MaterializedRegistry,
        depth: usize,
    ) -> Result<Value, CodecError> {
        let element_type = target
            .element_type()
            .ok_or_else(|| CodecError::TypeMismatch {
                expected: target.to_string(),
                found: "array".into(),
            })?
            .clone();

        let rank = reader.read_i32()?;
        let rank = usize::try_from(rank)
            .ok()
            .filter(|r| (1..=MAX_ARRAY_RANK).contains(r))
            .ok_or_else(|| CodecError::InvalidArray(format!("rank {rank}")))?;

        let mut bounds = Vec::with_capacity(rank);
        for _ in 0..rank {
            let lower = reader.read_i32()?;
            let upper = reader.read_i32()?;
            bounds.push(Bound::new(lower, upper));
        }
        let count = shape_len(&bounds)
            .ok_or_else(|| CodecError::InvalidArray(format!("bounds {bounds:?}")))?;
        let max = self.limits.max_collection_len;
        if count > max {
            return Err(CodecError::LengthLimit { len: count, max });
        }

        let array = ArrayValue::reserved(element_type.clone(), bounds, count.min(1024)).into_ref();
        registry.push(Value::Array(array.clone()));
        for _ in 0..count {
            let element = self.deserialize_at(&element_type, reader, registry, depth + 1)?;
            array.write().push(element);
        }
        Ok(Value::Array(array))
    }

    fn deserialize_blob(
        &self,
        target: &TypeTree,
        reader: &mut WireReader,
        registry: &mut MaterializedRegistry,
        depth: usize,
    ) -> Result<Value, CodecError> {
        if target.is_array() {
            return Err(CodecError::TypeMismatch {
                expected: target.to_string(),
                found: "blob".into(),
            });
        }
        let type_name = target.name();
        match self.types.descriptor(type_name) {
            Some(TypeDescriptor::Blob(codec)) => {
                let value = codec.decode(reader)?;
                registry.push(value.clone());
                Ok(value)
            }
            Some(TypeDescriptor::Composite(fields)) if !fields.is_empty() => {
                let mut object = Object::new(type_name);
                for field in fields.iter() {
                    object.set(field.name.clone(), self.types.default_value(&field.ty));
                }
                let handle = ObjectRef::new(object);
                registry.push(Value::Object(handle.clone()));
                for field in fields.iter() {
                    let value = self.deserialize_at(&field.ty, reader, registry, depth + 1)?;
                    handle.write().set(field.name.clone(), value);
                }
                Ok(Value::Object(handle))
            }
            Some(TypeDescriptor::Composite(_)) => Err(CodecError::Untransmittable {
                type_name: type_name.to_string(),
            }),
            None => Err(CodecError::UnknownType {
                type_name: type_name.to_string(),
            }),
        }
    }
}

/// Checks that `value` may be written where `declared` is expected, so the
/// reader, which only knows `declared`, stays in sync.
pub fn check_assignable(value: &Value, declared: &TypeTree) -> Result<(), CodecError> {
    let compatible = match value {
        Value::Null => true,
        Value::Array(array) => {
            declared.element_type() == Some(array.read().element_type())
        }
        other => !declared.is_array() && other.type_name() == declared.name(),
    };
    if compatible {
        Ok(())
    } else {
        Err(CodecError::TypeMismatch {
            expected: declared.to_string(),
            found: match value {
                Value::Array(array) => TypeTree::array_of(array.read().element_type().clone()).to_string(),
                other => other.type_name(),
            },
        })
    }
}
