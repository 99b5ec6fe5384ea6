//! # Object Graphs Across the Wire
//!
//! Cyclic and shared structures sent through a server that echoes its
//! argument back. Identity is checked on the caller's side after the round
//! trip: two positions that named one object before the call must name one
//! object after it.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use graphwire::{
        ArrayValue, FieldDescriptor, MethodSignature, Object, Peer, RpcConfig, TypeRegistry,
        TypeTree, Value,
    };

    use crate::integration::peer_pair;

    fn types() -> Arc<TypeRegistry> {
        let types = TypeRegistry::new();
        types.register_composite(
            "Node",
            vec![
                FieldDescriptor::new("value", TypeTree::i32()),
                FieldDescriptor::new("next", TypeTree::new("Node")),
            ],
        );
        types.register_composite(
            "Parent",
            vec![
                FieldDescriptor::new("name", TypeTree::string()),
                FieldDescriptor::new("children", TypeTree::array_of(TypeTree::new("Child"))),
            ],
        );
        types.register_composite(
            "Child",
            vec![
                FieldDescriptor::new("name", TypeTree::string()),
                FieldDescriptor::new("parent", TypeTree::new("Parent")),
            ],
        );
        Arc::new(types)
    }

    fn echo(ty: TypeTree) -> MethodSignature {
        MethodSignature::new(format!("Echo{}", ty.name()))
            .param(ty.clone())
            .returns(ty)
    }

    /// Client, server serving `Echo<ty>`, and the signature.
    fn echo_pair(ty: TypeTree) -> (Arc<Peer>, Arc<Peer>, MethodSignature) {
        let (client, server) = peer_pair(types(), RpcConfig::default());
        let sig = echo(ty);
        server.register_fn(sig.clone(), |mut args| Ok(args.pop().unwrap_or_default()));
        (client, server, sig)
    }

    fn next(value: &Value) -> Value {
        value.as_object().unwrap().field("next").unwrap()
    }

    #[tokio::test]
    async fn test_self_reference_survives() {
        let (client, _server, sig) = echo_pair(TypeTree::new("Node"));
        let node = Object::new("Node").with_field("value", 1).into_ref();
        node.set_field("next", node.clone());

        let back = client.call(&sig, &[Value::Object(node)]).await.unwrap();
        assert!(next(&back).same_handle(&back));
        assert_eq!(back.as_object().unwrap().field("value"), Some(Value::I32(1)));
    }

    #[tokio::test]
    async fn test_ring_closes_on_the_far_side() {
        let (client, _server, sig) = echo_pair(TypeTree::new("Node"));
        let nodes: Vec<_> = (0..5)
            .map(|i| Object::new("Node").with_field("value", i).into_ref())
            .collect();
        for (i, node) in nodes.iter().enumerate() {
            node.set_field("next", nodes[(i + 1) % nodes.len()].clone());
        }

        let head = client
            .call(&sig, &[Value::Object(nodes[0].clone())])
            .await
            .unwrap();

        let mut cursor = head.clone();
        for expected in 0..5 {
            assert_eq!(
                cursor.as_object().unwrap().field("value"),
                Some(Value::I32(expected))
            );
            cursor = next(&cursor);
        }
        assert!(cursor.same_handle(&head));
    }

    #[tokio::test]
    async fn test_children_point_back_to_parent() {
        let (client, _server, sig) = echo_pair(TypeTree::new("Parent"));

        let parent = Object::new("Parent").with_field("name", "root").into_ref();
        let children: Vec<Value> = ["a", "b", "c"]
            .iter()
            .map(|name| {
                Object::new("Child")
                    .with_field("name", *name)
                    .with_field("parent", parent.clone())
                    .into_ref()
                    .into()
            })
            .collect();
        let children = ArrayValue::from_vec(TypeTree::new("Child"), children).into_ref();
        parent.set_field("children", children);

        let back = client.call(&sig, &[Value::Object(parent)]).await.unwrap();
        let back_parent = back.as_object().unwrap();
        let array = back_parent.field("children").unwrap();
        let array = array.as_array().unwrap();
        assert_eq!(array.len(), 3);

        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            let child = array.element(i).unwrap();
            let child = child.as_object().unwrap();
            assert_eq!(child.field("name"), Some(Value::from(*name)));
            assert!(child.field("parent").unwrap().same_handle(&back));
        }
    }

    #[tokio::test]
    async fn test_shared_leaf_stays_shared() {
        let (client, _server, sig) = echo_pair(TypeTree::array_of(TypeTree::new("Node")));
        let leaf: Value = Object::new("Node").with_field("value", 9).into_ref().into();
        let array = ArrayValue::from_vec(
            TypeTree::new("Node"),
            vec![leaf.clone(), Value::Null, leaf],
        )
        .into_ref();

        let back = client.call(&sig, &[Value::Array(array)]).await.unwrap();
        let back = back.as_array().unwrap();
        let first = back.element(0).unwrap();
        assert!(back.element(1).unwrap().is_null());
        assert!(first.same_handle(&back.element(2).unwrap()));
    }

    #[tokio::test]
    async fn test_matrix_keeps_shape() {
        let (client, _server, sig) = echo_pair(TypeTree::array_of(TypeTree::i32()));
        let elements = (0..6).map(Value::I32).collect();
        let matrix = ArrayValue::with_bounds(
            TypeTree::i32(),
            vec![graphwire::Bound::new(1, 2), graphwire::Bound::new(0, 2)],
            elements,
        )
        .unwrap()
        .into_ref();

        let back = client.call(&sig, &[Value::Array(matrix)]).await.unwrap();
        let back = back.as_array().unwrap().read().clone();
        assert_eq!(back.rank(), 2);
        assert_eq!(back.bounds()[0], graphwire::Bound::new(1, 2));
        assert_eq!(back.get(&[2, 1]), Some(&Value::I32(4)));
    }
}
