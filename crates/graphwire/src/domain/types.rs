//! Type registry: how each named type is serialized.
//!
//! Every type that can cross the wire is looked up here by qualified name.
//! A type is either a blob, encoded by an external [`BlobCodec`], or a
//! composite whose declared fields are walked in order by the graph codec.
//! Arrays are built in and never registered.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::type_tree::{names, TypeTree};
use super::value::Value;
use super::wire::{WireReader, WireWriter};
use crate::error::CodecError;

/// Encodes and decodes one type as an opaque byte run.
///
/// A blob codec sees only the wire cursor; it cannot emit nested graph
/// values, so blobs never contain pointers.
pub trait BlobCodec: Send + Sync {
    fn encode(&self, value: &Value, writer: &mut WireWriter) -> Result<(), CodecError>;

    fn decode(&self, reader: &mut WireReader) -> Result<Value, CodecError>;

    /// Value produced for a `Null` tag of this type.
    fn default_value(&self) -> Value {
        Value::Null
    }
}

/// A named, typed field of a composite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: TypeTree,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeTree) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Serialization strategy for a registered type.
#[derive(Clone)]
pub enum TypeDescriptor {
    Blob(Arc<dyn BlobCodec>),
    Composite(Arc<[FieldDescriptor]>),
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Blob(_) => f.write_str("Blob(..)"),
            TypeDescriptor::Composite(fields) => f.debug_tuple("Composite").field(fields).finish(),
        }
    }
}

/// Name-to-descriptor map shared by all codecs of a peer.
pub struct TypeRegistry {
    types: RwLock<HashMap<String, TypeDescriptor>>,
}

impl TypeRegistry {
    /// Registry preloaded with the built-in primitive codecs.
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register_blob(names::BOOL, BoolCodec);
        registry.register_blob(names::I32, I32Codec);
        registry.register_blob(names::I64, I64Codec);
        registry.register_blob(names::F64, F64Codec);
        registry.register_blob(names::STRING, StringCodec);
        registry.register_blob(names::BYTES, BytesCodec);
        registry
    }

    /// Registry with no types at all.
    pub fn empty() -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
        }
    }

    /// Registers or replaces a blob type.
    pub fn register_blob(&self, name: impl Into<String>, codec: impl BlobCodec + 'static) {
        self.types
            .write()
            .insert(name.into(), TypeDescriptor::Blob(Arc::new(codec)));
    }

    /// Registers or replaces a composite type.
    ///
    /// A composite without fields can be registered but is rejected as
    /// untransmittable when encoded.
    pub fn register_composite(&self, name: impl Into<String>, fields: Vec<FieldDescriptor>) {
        self.types
            .write()
            .insert(name.into(), TypeDescriptor::Composite(fields.into()));
    }

    pub fn descriptor(&self, name: &str) -> Option<TypeDescriptor> {
        self.types.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }

    /// Value decoded for a `Null` tag: zero for primitives, `Null` otherwise.
    pub fn default_value(&self, ty: &TypeTree) -> Value {
        if ty.is_array() || ty.is_void() {
            return Value::Null;
        }
        match self.descriptor(ty.name()) {
            Some(TypeDescriptor::Blob(codec)) => codec.default_value(),
            _ => Value::Null,
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.types.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}

fn mismatch(expected: &str, found: &Value) -> CodecError {
    CodecError::TypeMismatch {
        expected: expected.to_string(),
        found: found.type_name(),
    }
}

struct BoolCodec;

impl BlobCodec for BoolCodec {
    fn encode(&self, value: &Value, writer: &mut WireWriter) -> Result<(), CodecError> {
        let v = value.as_bool().ok_or_else(|| mismatch(names::BOOL, value))?;
        writer.write_bool(v);
        Ok(())
    }

    fn decode(&self, reader: &mut WireReader) -> Result<Value, CodecError> {
        reader.read_bool().map(Value::Bool)
    }

    fn default_value(&self) -> Value {
        Value::Bool(false)
    }
}

struct I32Codec;

impl BlobCodec for I32Codec {
    fn encode(&self, value: &Value, writer: &mut WireWriter) -> Result<(), CodecError> {
        let v = value.as_i32().ok_or_else(|| mismatch(names::I32, value))?;
        writer.write_i32(v);
        Ok(())
    }

    fn decode(&self, reader: &mut WireReader) -> Result<Value, CodecError> {
        reader.read_i32().map(Value::I32)
    }

    fn default_value(&self) -> Value {
        Value::I32(0)
    }
}

struct I64Codec;

impl BlobCodec for I64Codec {
    fn encode(&self, value: &Value, writer: &mut WireWriter) -> Result<(), CodecError> {
        let v = value.as_i64().ok_or_else(|| mismatch(names::I64, value))?;
        writer.write_i64(v);
        Ok(())
    }

    fn decode(&self, reader: &mut WireReader) -> Result<Value, CodecError> {
        reader.read_i64().map(Value::I64)
    }

    fn default_value(&self) -> Value {
        Value::I64(0)
    }
}

struct F64Codec;

impl BlobCodec for F64Codec {
    fn encode(&self, value: &Value, writer: &mut WireWriter) -> Result<(), CodecError> {
        let v = value.as_f64().ok_or_else(|| mismatch(names::F64, value))?;
        writer.write_f64(v);
        Ok(())
    }

    fn decode(&self, reader: &mut WireReader) -> Result<Value, CodecError> {
        reader.read_f64().map(Value::F64)
    }

    fn default_value(&self) -> Value {
        Value::F64(0.0)
    }
}

struct StringCodec;

impl BlobCodec for StringCodec {
    fn encode(&self, value: &Value, writer: &mut WireWriter) -> Result<(), CodecError> {
        let v = value.as_str().ok_or_else(|| mismatch(names::STRING, value))?;
        writer.write_str(v);
        Ok(())
    }

    fn decode(&self, reader: &mut WireReader) -> Result<Value, CodecError> {
        reader.read_str().map(Value::Str)
    }

    fn default_value(&self) -> Value {
        Value::Str(String::new())
    }
}

struct BytesCodec;

impl BlobCodec for BytesCodec {
    fn encode(&self, value: &Value, writer: &mut WireWriter) -> Result<(), CodecError> {
        let v = value.as_bytes().ok_or_else(|| mismatch(names::BYTES, value))?;
        writer.write_bytes(v);
        Ok(())
    }

    fn decode(&self, reader: &mut WireReader) -> Result<Value, CodecError> {
        reader.read_bytes().map(|b| Value::Bytes(b.to_vec()))
    }

    fn default_value(&self) -> Value {
        Value::Bytes(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value::Object;

    struct Celsius;

    impl BlobCodec for Celsius {
        fn encode(&self, value: &Value, writer: &mut WireWriter) -> Result<(), CodecError> {
            let obj = value.as_object().ok_or_else(|| mismatch("Celsius", value))?;
            let degrees = obj.field("deg").and_then(|v| v.as_f64()).unwrap_or_default();
            writer.write_f64(degrees);
            Ok(())
        }

        fn decode(&self, reader: &mut WireReader) -> Result<Value, CodecError> {
            let deg = reader.read_f64()?;
            Ok(Value::Object(
                Object::new("Celsius").with_field("deg", deg).into_ref(),
            ))
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = TypeRegistry::new();
        for name in [names::BOOL, names::I32, names::I64, names::F64, names::STRING, names::BYTES] {
            assert!(registry.contains(name), "missing {name}");
        }
        assert!(!registry.contains(names::ARRAY));
        assert!(TypeRegistry::empty().is_empty());
    }

    #[test]
    fn test_default_values() {
        let registry = TypeRegistry::new();
        registry.register_composite("Record", vec![FieldDescriptor::new("id", TypeTree::i32())]);

        assert_eq!(registry.default_value(&TypeTree::i32()), Value::I32(0));
        assert_eq!(registry.default_value(&TypeTree::string()), Value::Str(String::new()));
        assert_eq!(registry.default_value(&TypeTree::new("Record")), Value::Null);
        assert_eq!(
            registry.default_value(&TypeTree::array_of(TypeTree::i32())),
            Value::Null
        );
        assert_eq!(registry.default_value(&TypeTree::new("Unknown")), Value::Null);
    }

    #[test]
    fn test_builtin_codec_rejects_wrong_variant() {
        let registry = TypeRegistry::new();
        let Some(TypeDescriptor::Blob(codec)) = registry.descriptor(names::I32) else {
            panic!("i32 should be a blob");
        };
        let mut w = WireWriter::new();
        let err = codec.encode(&Value::from("nope"), &mut w).unwrap_err();
        assert_eq!(
            err,
            CodecError::TypeMismatch {
                expected: "i32".into(),
                found: "string".into()
            }
        );
        assert!(w.is_empty());
    }

    #[test]
    fn test_custom_blob_codec() {
        let registry = TypeRegistry::new();
        registry.register_blob("Celsius", Celsius);
        let Some(TypeDescriptor::Blob(codec)) = registry.descriptor("Celsius") else {
            panic!("Celsius should be a blob");
        };
        let value = Value::Object(
            Object::new("Celsius").with_field("deg", 21.5).into_ref(),
        );
        let mut w = WireWriter::new();
        codec.encode(&value, &mut w).unwrap();
        let decoded = codec.decode(&mut WireReader::new(w.into_bytes())).unwrap();
        assert_eq!(decoded, value);
    }
}
