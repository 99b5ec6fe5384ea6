//! Type signatures as nested name trees.
//!
//! A `TypeTree` names a type and, recursively, its generic arguments. It is
//! how method parameters, generic parameters and return types are described
//! on the wire without shipping executable metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::wire::{WireReader, WireWriter};
use crate::error::CodecError;

/// Qualified names of the built-in types.
pub mod names {
    pub const VOID: &str = "void";
    pub const BOOL: &str = "bool";
    pub const I32: &str = "i32";
    pub const I64: &str = "i64";
    pub const F64: &str = "f64";
    pub const STRING: &str = "string";
    pub const BYTES: &str = "bytes";
    /// Arrays carry their element type as the single generic argument.
    pub const ARRAY: &str = "array";
}

/// A type's qualified name plus its ordered generic arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeTree {
    name: String,
    args: Vec<TypeTree>,
}

impl TypeTree {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeTree>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn void() -> Self {
        Self::new(names::VOID)
    }

    pub fn bool() -> Self {
        Self::new(names::BOOL)
    }

    pub fn i32() -> Self {
        Self::new(names::I32)
    }

    pub fn i64() -> Self {
        Self::new(names::I64)
    }

    pub fn f64() -> Self {
        Self::new(names::F64)
    }

    pub fn string() -> Self {
        Self::new(names::STRING)
    }

    pub fn bytes() -> Self {
        Self::new(names::BYTES)
    }

    pub fn array_of(element: TypeTree) -> Self {
        Self::generic(names::ARRAY, vec![element])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[TypeTree] {
        &self.args
    }

    pub fn is_void(&self) -> bool {
        self.name == names::VOID && self.args.is_empty()
    }

    pub fn is_array(&self) -> bool {
        self.name == names::ARRAY
    }

    /// Element type of an array type.
    pub fn element_type(&self) -> Option<&TypeTree> {
        if self.is_array() {
            self.args.first()
        } else {
            None
        }
    }

    /// Name, child count, then each child.
    pub fn write(&self, writer: &mut WireWriter) {
        writer.write_str(&self.name);
        writer.write_len(self.args.len());
        for arg in &self.args {
            arg.write(writer);
        }
    }

    /// Reads one tree, rejecting nesting deeper than `max_depth`.
    pub fn read(reader: &mut WireReader, max_depth: usize) -> Result<Self, CodecError> {
        Self::read_at(reader, 0, max_depth)
    }

    fn read_at(reader: &mut WireReader, depth: usize, max_depth: usize) -> Result<Self, CodecError> {
        if depth > max_depth {
            return Err(CodecError::DepthExceeded { max: max_depth });
        }
        let name = reader.read_str()?;
        let count = reader.read_len()?;
        let mut args = Vec::with_capacity(count.min(16));
        for _ in 0..count {
            args.push(Self::read_at(reader, depth + 1, max_depth)?);
        }
        Ok(Self { name, args })
    }
}

impl fmt::Display for TypeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

/// Writes a count followed by each tree.
pub fn write_type_list(types: &[TypeTree], writer: &mut WireWriter) {
    writer.write_len(types.len());
    for ty in types {
        ty.write(writer);
    }
}

/// Reads a count followed by that many trees.
pub fn read_type_list(reader: &mut WireReader, max_depth: usize) -> Result<Vec<TypeTree>, CodecError> {
    let count = reader.read_len()?;
    let mut types = Vec::with_capacity(count.min(16));
    for _ in 0..count {
        types.push(TypeTree::read(reader, max_depth)?);
    }
    Ok(types)
}
