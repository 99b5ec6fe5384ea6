//! Types the demo peers exchange.

use graphwire::{
    CodecError, FieldDescriptor, Object, Transmittable, TypeRegistry, TypeTree, Value,
};

/// A flat record with a string array field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    pub id: i32,
    pub name: String,
    pub tags: Vec<String>,
}

impl Record {
    pub const TYPE_NAME: &'static str = "Record";

    pub fn register(types: &TypeRegistry) {
        types.register_composite(
            Self::TYPE_NAME,
            vec![
                FieldDescriptor::new("id", TypeTree::i32()),
                FieldDescriptor::new("name", TypeTree::string()),
                FieldDescriptor::new("tags", TypeTree::array_of(TypeTree::string())),
            ],
        );
    }
}

impl Transmittable for Record {
    fn type_tree() -> TypeTree {
        TypeTree::new(Self::TYPE_NAME)
    }

    fn to_value(&self) -> Value {
        Object::new(Self::TYPE_NAME)
            .with_field("id", self.id)
            .with_field("name", self.name.clone())
            .with_field("tags", self.tags.to_value())
            .into_ref()
            .into()
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        let object = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(object) => object,
            other => {
                return Err(CodecError::TypeMismatch {
                    expected: Self::TYPE_NAME.to_string(),
                    found: other.type_name(),
                })
            }
        };
        let field = |name: &str| object.field(name).unwrap_or_default();
        Ok(Self {
            id: i32::from_value(field("id"))?,
            name: String::from_value(field("name"))?,
            tags: Vec::<String>::from_value(field("tags"))?,
        })
    }
}

/// Registers a singly linked `ListNode { value: i32, next: ListNode }`.
pub fn register_list_node(types: &TypeRegistry) {
    types.register_composite(
        "ListNode",
        vec![
            FieldDescriptor::new("value", TypeTree::i32()),
            FieldDescriptor::new("next", TypeTree::new("ListNode")),
        ],
    );
}

/// Builds a ring of `len` nodes and returns its head.
pub fn ring(len: i32) -> Value {
    let head = Object::new("ListNode").with_field("value", 0).into_ref();
    let mut tail = head.clone();
    for value in 1..len {
        let node = Object::new("ListNode").with_field("value", value).into_ref();
        tail.set_field("next", node.clone());
        tail = node;
    }
    tail.set_field("next", head.clone());
    Value::Object(head)
}
