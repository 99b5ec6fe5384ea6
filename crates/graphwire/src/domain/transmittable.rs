//! Conversions between Rust types and [`Value`].

use super::type_tree::TypeTree;
use super::value::{ArrayValue, Value};
use crate::error::CodecError;

/// A Rust type with a wire type signature and a `Value` representation.
///
/// `Null` converts to the type's default, matching what the decoder yields
/// for a `Null` tag.
pub trait Transmittable: Sized {
    fn type_tree() -> TypeTree;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, CodecError>;
}

fn mismatch<T: Transmittable>(found: &Value) -> CodecError {
    CodecError::TypeMismatch {
        expected: T::type_tree().to_string(),
        found: found.type_name(),
    }
}

macro_rules! primitive_transmittable {
    ($ty:ty, $tree:ident, $variant:ident) => {
        impl Transmittable for $ty {
            fn type_tree() -> TypeTree {
                TypeTree::$tree()
            }

            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }

            fn from_value(value: Value) -> Result<Self, CodecError> {
                match value {
                    Value::$variant(v) => Ok(v),
                    Value::Null => Ok(<$ty>::default()),
                    other => Err(mismatch::<$ty>(&other)),
                }
            }
        }
    };
}

primitive_transmittable!(bool, bool, Bool);
primitive_transmittable!(i32, i32, I32);
primitive_transmittable!(i64, i64, I64);
primitive_transmittable!(f64, f64, F64);
primitive_transmittable!(String, string, Str);

impl Transmittable for () {
    fn type_tree() -> TypeTree {
        TypeTree::void()
    }

    fn to_value(&self) -> Value {
        Value::Null
    }

    fn from_value(_value: Value) -> Result<Self, CodecError> {
        Ok(())
    }
}

impl<T: Transmittable> Transmittable for Option<T> {
    fn type_tree() -> TypeTree {
        T::type_tree()
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// One-dimensional arrays. A `Null` array converts to an empty `Vec`.
impl<T: Transmittable> Transmittable for Vec<T> {
    fn type_tree() -> TypeTree {
        TypeTree::array_of(T::type_tree())
    }

    fn to_value(&self) -> Value {
        let elements = self.iter().map(Transmittable::to_value).collect();
        Value::Array(ArrayValue::from_vec(T::type_tree(), elements).into_ref())
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(array) => {
                let elements = {
                    let guard = array.read();
                    if guard.rank() != 1 {
                        return Err(CodecError::InvalidArray(format!(
                            "expected rank 1, found {}",
                            guard.rank()
                        )));
                    }
                    guard.elements().to_vec()
                };
                elements.into_iter().map(T::from_value).collect()
            }
            other => Err(mismatch::<Self>(&other)),
        }
    }
}
