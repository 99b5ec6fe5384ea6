//! # Codec Properties
//!
//! Property tests over generated inputs: decoding what was encoded gives
//! back an equal value, and arbitrary bytes never panic the decoder.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use proptest::prelude::*;

    use graphwire::{
        ArrayValue, CallCodec, CodecLimits, GraphCodec, MethodSignature, RegistryScope,
        TypeRegistry, TypeTree, Value, WireReader, WireWriter,
    };

    fn codec() -> GraphCodec {
        GraphCodec::new(Arc::new(TypeRegistry::new()), CodecLimits::default())
    }

    fn primitive() -> impl Strategy<Value = (TypeTree, Value)> {
        prop_oneof![
            any::<bool>().prop_map(|v| (TypeTree::bool(), Value::Bool(v))),
            any::<i32>().prop_map(|v| (TypeTree::i32(), Value::I32(v))),
            any::<i64>().prop_map(|v| (TypeTree::i64(), Value::I64(v))),
            any::<f64>()
                .prop_filter("NaN never equals itself", |v| !v.is_nan())
                .prop_map(|v| (TypeTree::f64(), Value::F64(v))),
            ".{0,64}".prop_map(|v| (TypeTree::string(), Value::Str(v))),
            proptest::collection::vec(any::<u8>(), 0..128)
                .prop_map(|v| (TypeTree::bytes(), Value::Bytes(v))),
        ]
    }

    fn type_tree() -> impl Strategy<Value = TypeTree> {
        let leaf = "[A-Za-z][A-Za-z0-9_]{0,12}".prop_map(TypeTree::new);
        leaf.prop_recursive(4, 32, 4, |inner| {
            (
                "[A-Za-z][A-Za-z0-9_]{0,12}",
                proptest::collection::vec(inner, 0..4),
            )
                .prop_map(|(name, args)| TypeTree::generic(name, args))
        })
    }

    proptest! {
        #[test]
        fn prop_primitives_survive((ty, value) in primitive()) {
            let codec = codec();
            let bytes = codec.encode_value(&value).unwrap();
            prop_assert_eq!(codec.decode_value(&ty, bytes).unwrap(), value);
        }

        #[test]
        fn prop_i32_arrays_survive(items in proptest::collection::vec(any::<i32>(), 0..64)) {
            let codec = codec();
            let value = Value::Array(
                ArrayValue::from_vec(TypeTree::i32(), items.into_iter().map(Value::I32).collect())
                    .into_ref(),
            );
            let bytes = codec.encode_value(&value).unwrap();
            let back = codec
                .decode_value(&TypeTree::array_of(TypeTree::i32()), bytes)
                .unwrap();
            prop_assert_eq!(back, value);
        }

        #[test]
        fn prop_type_trees_survive(tree in type_tree()) {
            let mut writer = WireWriter::new();
            tree.write(&mut writer);
            let mut reader = WireReader::new(writer.into_bytes());
            prop_assert_eq!(TypeTree::read(&mut reader, 64).unwrap(), tree);
            prop_assert!(reader.rest().is_empty());
        }

        #[test]
        fn prop_call_arguments_survive(
            a in any::<i32>(),
            b in ".{0,32}",
            scope in prop_oneof![Just(RegistryScope::PerArgument), Just(RegistryScope::PerCall)],
        ) {
            let calls = CallCodec::new(codec(), scope);
            let sig = MethodSignature::new("Put")
                .param(TypeTree::i32())
                .param(TypeTree::string())
                .returns(TypeTree::bool());
            let args = vec![Value::I32(a), Value::Str(b)];
            let (id, bytes) = calls.encode_call(&sig, &args).unwrap();

            let mut reader = calls.reader(bytes);
            let header = calls.read_header(&mut reader).unwrap();
            prop_assert_eq!(header.correlation_id, id);
            prop_assert_eq!(header.method.as_str(), "Put");
            prop_assert_eq!(calls.read_args(&header.param_types, &mut reader).unwrap(), args);
        }

        #[test]
        fn prop_garbage_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let codec = codec();
            let _ = codec.decode_value(&TypeTree::array_of(TypeTree::string()), Bytes::from(data.clone()));
            let _ = codec.decode_value(&TypeTree::i64(), Bytes::from(data.clone()));
            let _ = TypeTree::read(&mut WireReader::new(Bytes::from(data)), 64);
        }
    }
}
