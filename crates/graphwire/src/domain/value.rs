//! Dynamic object model carried by the graph codec.
//!
//! Objects and arrays are shared handles. Two handles are "the same object"
//! when they point at the same allocation, which is what the visited
//! registry keys on. Cloning a handle preserves identity; building a new one
//! does not.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::type_tree::{names, TypeTree};
use crate::error::CodecError;

/// A transmittable value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Object(ObjectRef),
    Array(ArrayRef),
}

impl Value {
    /// Runtime type name used to look up a serialization strategy.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => names::VOID.to_string(),
            Value::Bool(_) => names::BOOL.to_string(),
            Value::I32(_) => names::I32.to_string(),
            Value::I64(_) => names::I64.to_string(),
            Value::F64(_) => names::F64.to_string(),
            Value::Str(_) => names::STRING.to_string(),
            Value::Bytes(_) => names::BYTES.to_string(),
            Value::Object(obj) => obj.type_name(),
            Value::Array(_) => names::ARRAY.to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Allocation address for handle values, `None` for everything else.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Object(obj) => Some(obj.id()),
            Value::Array(arr) => Some(arr.id()),
            _ => None,
        }
    }

    /// True when both values are the same shared handle.
    pub fn same_handle(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

impl From<ArrayRef> for Value {
    fn from(v: ArrayRef) -> Self {
        Value::Array(v)
    }
}

/// Structural equality. Cycles are compared by assuming equality for any
/// handle pair already under comparison.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut seen = HashSet::new();
        structural_eq(self, other, &mut seen)
    }
}

fn structural_eq(a: &Value, b: &Value, seen: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::I32(x), Value::I32(y)) => x == y,
        (Value::I64(x), Value::I64(y)) => x == y,
        (Value::F64(x), Value::F64(y)) => x.to_bits() == y.to_bits() || x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bytes(x), Value::Bytes(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => {
            if x.ptr_eq(y) || !seen.insert((x.id(), y.id())) {
                return true;
            }
            // Snapshot so no lock is held while recursing into cycles.
            let (lt, lf) = {
                let o = x.read();
                (o.type_name.clone(), o.fields.clone())
            };
            let (rt, rf) = {
                let o = y.read();
                (o.type_name.clone(), o.fields.clone())
            };
            lt == rt
                && lf.len() == rf.len()
                && lf
                    .iter()
                    .zip(rf.iter())
                    .all(|((ln, lv), (rn, rv))| ln == rn && structural_eq(lv, rv, seen))
        }
        (Value::Array(x), Value::Array(y)) => {
            if x.ptr_eq(y) || !seen.insert((x.id(), y.id())) {
                return true;
            }
            let (lb, le) = {
                let a = x.read();
                (a.bounds.clone(), a.elements.clone())
            };
            let (rb, re) = {
                let a = y.read();
                (a.bounds.clone(), a.elements.clone())
            };
            lb == rb
                && le.len() == re.len()
                && le
                    .iter()
                    .zip(re.iter())
                    .all(|(l, r)| structural_eq(l, r, seen))
        }
        _ => false,
    }
}

/// A composite instance: a type name and its named field values.
#[derive(Debug, Clone)]
pub struct Object {
    type_name: String,
    fields: Vec<(String, Value)>,
}

impl Object {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Overwrites an existing field or appends a new one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn into_ref(self) -> ObjectRef {
        ObjectRef::new(self)
    }
}

/// Shared handle to an [`Object`].
#[derive(Clone)]
pub struct ObjectRef(Arc<RwLock<Object>>);

impl ObjectRef {
    pub fn new(object: Object) -> Self {
        Self(Arc::new(RwLock::new(object)))
    }

    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Object> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Object> {
        self.0.write()
    }

    pub fn type_name(&self) -> String {
        self.0.read().type_name.clone()
    }

    /// Cloned field value; handles inside stay shared.
    pub fn field(&self, name: &str) -> Option<Value> {
        self.0.read().get(name).cloned()
    }

    pub fn set_field(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.write().set(name, value);
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Shallow: a full dump would recurse forever on cycles.
        write!(f, "ObjectRef({} @ {:#x})", self.type_name(), self.id())
    }
}

/// Inclusive bounds of one array dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bound {
    pub lower: i32,
    pub upper: i32,
}

impl Bound {
    pub fn new(lower: i32, upper: i32) -> Self {
        Self { lower, upper }
    }

    /// Zero-based bound for `len` elements. An empty dimension is `(0, -1)`.
    pub fn of_len(len: usize) -> Self {
        let upper = i32::try_from(len).map(|n| n - 1).unwrap_or(i32::MAX - 1);
        Self { lower: 0, upper }
    }

    /// Element count of this dimension, `None` if `upper < lower - 1`.
    pub fn len(&self) -> Option<usize> {
        let span = i64::from(self.upper) - i64::from(self.lower) + 1;
        usize::try_from(span).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

/// Total element count for a shape, `None` if malformed or overflowing.
pub fn shape_len(bounds: &[Bound]) -> Option<usize> {
    bounds
        .iter()
        .try_fold(1usize, |acc, b| acc.checked_mul(b.len()?))
}

/// A possibly multi-dimensional array stored in row-major order.
#[derive(Debug, Clone)]
pub struct ArrayValue {
    element_type: TypeTree,
    bounds: Vec<Bound>,
    elements: Vec<Value>,
}

impl ArrayValue {
    /// One-dimensional, zero-based array.
    pub fn from_vec(element_type: TypeTree, elements: Vec<Value>) -> Self {
        Self {
            element_type,
            bounds: vec![Bound::of_len(elements.len())],
            elements,
        }
    }

    /// Array with explicit per-dimension bounds.
    pub fn with_bounds(
        element_type: TypeTree,
        bounds: Vec<Bound>,
        elements: Vec<Value>,
    ) -> Result<Self, CodecError> {
        if bounds.is_empty() {
            return Err(CodecError::InvalidArray("rank must be at least 1".into()));
        }
        let expected = shape_len(&bounds)
            .ok_or_else(|| CodecError::InvalidArray(format!("malformed bounds {bounds:?}")))?;
        if expected != elements.len() {
            return Err(CodecError::InvalidArray(format!(
                "shape holds {expected} elements, got {}",
                elements.len()
            )));
        }
        Ok(Self {
            element_type,
            bounds,
            elements,
        })
    }

    /// Shape with no elements yet; filled by the decoder.
    pub(crate) fn reserved(element_type: TypeTree, bounds: Vec<Bound>, capacity: usize) -> Self {
        Self {
            element_type,
            bounds,
            elements: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.elements.push(value);
    }

    pub fn element_type(&self) -> &TypeTree {
        &self.element_type
    }

    pub fn bounds(&self) -> &[Bound] {
        &self.bounds
    }

    pub fn rank(&self) -> usize {
        self.bounds.len()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    /// Element at a multi-dimensional index, honoring lower bounds.
    pub fn get(&self, index: &[i32]) -> Option<&Value> {
        self.offset(index).and_then(|i| self.elements.get(i))
    }

    pub fn set(&mut self, index: &[i32], value: Value) -> bool {
        match self.offset(index).and_then(|i| self.elements.get_mut(i)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn offset(&self, index: &[i32]) -> Option<usize> {
        if index.len() != self.bounds.len() {
            return None;
        }
        let mut offset = 0usize;
        for (&i, bound) in index.iter().zip(&self.bounds) {
            if i < bound.lower || i > bound.upper {
                return None;
            }
            let dim = bound.len()?;
            let pos = usize::try_from(i64::from(i) - i64::from(bound.lower)).ok()?;
            offset = offset.checked_mul(dim)?.checked_add(pos)?;
        }
        Some(offset)
    }

    pub fn into_ref(self) -> ArrayRef {
        ArrayRef::new(self)
    }
}

/// Shared handle to an [`ArrayValue`].
#[derive(Clone)]
pub struct ArrayRef(Arc<RwLock<ArrayValue>>);

impl ArrayRef {
    pub fn new(array: ArrayValue) -> Self {
        Self(Arc::new(RwLock::new(array)))
    }

    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ArrayValue> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ArrayValue> {
        self.0.write()
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Cloned element at a one-dimensional position.
    pub fn element(&self, position: usize) -> Option<Value> {
        self.0.read().elements.get(position).cloned()
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let array = self.0.read();
        write!(
            f,
            "ArrayRef({}[{}] @ {:#x})",
            array.element_type,
            array.elements.len(),
            self.id()
        )
    }
}
