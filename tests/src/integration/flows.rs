//! # Call Flows
//!
//! Two peers connected by a `MemoryChannel`, exercising every way a call
//! can end:
//!
//! 1. **Reply**: the server's handler result reaches the caller
//! 2. **Abort**: the server cannot serve, the caller gets the default
//! 3. **Timeout**: no reply in time, the pending entry is gone
//! 4. **Local failure**: nothing reaches the wire, nothing stays pending

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use graphwire::{
        ChannelError, CodecError, FieldDescriptor, HandlerError, MethodHandler, MethodSignature,
        Object, RegistryScope, RpcConfig, RpcConfigBuilder, RpcError, TypeRegistry, TypeTree,
        Value,
    };

    use crate::integration::peer_pair;

    // =========================================================================
    // FIXTURES
    // =========================================================================

    fn types() -> Arc<TypeRegistry> {
        let types = TypeRegistry::new();
        types.register_composite(
            "Record",
            vec![
                FieldDescriptor::new("id", TypeTree::i32()),
                FieldDescriptor::new("name", TypeTree::string()),
            ],
        );
        types.register_composite(
            "Node",
            vec![
                FieldDescriptor::new("value", TypeTree::i32()),
                FieldDescriptor::new("next", TypeTree::new("Node")),
            ],
        );
        Arc::new(types)
    }

    fn fetch() -> MethodSignature {
        MethodSignature::new("Fetch")
            .param(TypeTree::i32())
            .returns(TypeTree::new("Record"))
    }

    fn add() -> MethodSignature {
        MethodSignature::new("Add")
            .param(TypeTree::i32())
            .param(TypeTree::i32())
            .returns(TypeTree::i32())
    }

    fn serve_fetch(server: &graphwire::Peer) {
        server.register_fn(fetch(), |args| {
            let id = args[0]
                .as_i32()
                .ok_or_else(|| HandlerError::new("id must be i32"))?;
            Ok(Object::new("Record")
                .with_field("id", id)
                .with_field("name", format!("record-{id}"))
                .into_ref()
                .into())
        });
    }

    fn serve_add(server: &graphwire::Peer) {
        server.register_fn(add(), |args| match (args[0].as_i32(), args[1].as_i32()) {
            (Some(a), Some(b)) => Ok(Value::I32(a + b)),
            _ => Err(HandlerError::new("Add expects two i32")),
        });
    }

    /// Sleeps before answering.
    struct Slow(Duration);

    #[async_trait]
    impl MethodHandler for Slow {
        async fn invoke(&self, _args: Vec<Value>) -> Result<Value, HandlerError> {
            tokio::time::sleep(self.0).await;
            Ok(Value::I32(7))
        }
    }

    fn slow() -> MethodSignature {
        MethodSignature::new("Slow").returns(TypeTree::i32())
    }

    // =========================================================================
    // REPLIES
    // =========================================================================

    #[tokio::test]
    async fn test_fetch_returns_record() {
        let (client, server) = peer_pair(types(), RpcConfig::default());
        serve_fetch(&server);

        let record = client.call(&fetch(), &[Value::I32(42)]).await.unwrap();
        let record = record.as_object().unwrap();
        assert_eq!(record.type_name(), "Record");
        assert_eq!(record.field("id"), Some(Value::I32(42)));
        assert_eq!(record.field("name"), Some(Value::from("record-42")));

        assert_eq!(client.pending().pending_count(), 0);
        assert_eq!(client.metrics().snapshot().calls_completed, 1);
        assert_eq!(server.metrics().snapshot().calls_served, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_are_correlated() {
        let (client, server) = peer_pair(types(), RpcConfig::default());
        serve_add(&server);

        let calls: Vec<_> = (0..64)
            .map(|i| {
                let client = client.clone();
                tokio::spawn(async move {
                    let result = client
                        .call(&add(), &[Value::I32(i), Value::I32(1000)])
                        .await
                        .unwrap();
                    (i, result)
                })
            })
            .collect();

        for call in calls {
            let (i, result) = call.await.unwrap();
            assert_eq!(result, Value::I32(i + 1000));
        }
        assert_eq!(client.pending().pending_count(), 0);
        assert_eq!(client.pending().snapshot().completed, 64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_call_from_worker_thread() {
        let (client, server) = peer_pair(types(), RpcConfig::default());
        serve_add(&server);

        let result = tokio::task::spawn_blocking(move || {
            client.call_blocking(&add(), &[Value::I32(40), Value::I32(2)])
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(result, Value::I32(42));
    }

    #[tokio::test]
    async fn test_notification_runs_without_reply() {
        let (client, server) = peer_pair(types(), RpcConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = seen.clone();
            server.register_fn(
                MethodSignature::new("Log").param(TypeTree::string()),
                move |args| {
                    let line = args[0].as_str().unwrap_or_default().to_string();
                    seen.lock().push(line);
                    Ok(Value::Null)
                },
            );
        }

        client
            .notify(
                &MethodSignature::new("Log").param(TypeTree::string()),
                &[Value::from("hello")],
            )
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while seen.lock().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(*seen.lock(), vec!["hello".to_string()]);
        assert_eq!(client.pending().snapshot().registered, 0);
        assert_eq!(client.metrics().snapshot().notifications_sent, 1);
        assert_eq!(server.metrics().snapshot().calls_served, 1);
    }

    // =========================================================================
    // ABORTS
    // =========================================================================

    #[tokio::test]
    async fn test_handler_error_yields_default() {
        let (client, server) = peer_pair(types(), RpcConfig::default());
        let divide = MethodSignature::new("Divide")
            .param(TypeTree::i32())
            .param(TypeTree::i32())
            .returns(TypeTree::i32());
        server.register_fn(divide.clone(), |args| {
            match (args[0].as_i32(), args[1].as_i32()) {
                (Some(_), Some(0)) => Err(HandlerError::new("division by zero")),
                (Some(a), Some(b)) => Ok(Value::I32(a / b)),
                _ => Err(HandlerError::new("Divide expects two i32")),
            }
        });

        let ok = client.call(&divide, &[Value::I32(10), Value::I32(2)]).await.unwrap();
        assert_eq!(ok, Value::I32(5));

        let failed = client.call(&divide, &[Value::I32(10), Value::I32(0)]).await.unwrap();
        assert_eq!(failed, Value::I32(0));
        assert_eq!(client.metrics().snapshot().calls_aborted, 1);
        assert_eq!(server.metrics().snapshot().calls_rejected, 1);
    }

    #[tokio::test]
    async fn test_null_argument_arrives_as_default() {
        let (client, server) = peer_pair(types(), RpcConfig::default());
        serve_add(&server);
        let result = client.call(&add(), &[Value::Null, Value::I32(5)]).await.unwrap();
        assert_eq!(result, Value::I32(5));
    }

    #[tokio::test]
    async fn test_unknown_method_yields_default() {
        let (client, _server) = peer_pair(types(), RpcConfig::default());
        let result = client.call(&fetch(), &[Value::I32(1)]).await.unwrap();
        assert_eq!(result, Value::Null);

        let result = client
            .call(
                &MethodSignature::new("Count").returns(TypeTree::i64()),
                &[],
            )
            .await
            .unwrap();
        assert_eq!(result, Value::I64(0));
    }

    #[tokio::test]
    async fn test_generic_argument_mismatch_yields_default() {
        let (client, server) = peer_pair(types(), RpcConfig::default());
        server.register_fn(
            MethodSignature::new("Make")
                .generic_arg(TypeTree::i32())
                .returns(TypeTree::bool()),
            |_| Ok(Value::Bool(true)),
        );

        let matching = MethodSignature::new("Make")
            .generic_arg(TypeTree::i32())
            .returns(TypeTree::bool());
        assert_eq!(client.call(&matching, &[]).await.unwrap(), Value::Bool(true));

        let other = MethodSignature::new("Make")
            .generic_arg(TypeTree::string())
            .returns(TypeTree::bool());
        assert_eq!(client.call(&other, &[]).await.unwrap(), Value::Bool(false));
    }

    #[tokio::test]
    async fn test_shutdown_releases_pending_calls() {
        let (client, server) = peer_pair(types(), RpcConfig::default());
        server.register(slow(), Arc::new(Slow(Duration::from_secs(30))));

        let waiter = {
            let client = client.clone();
            tokio::spawn(async move { client.call(&slow(), &[]).await })
        };
        while client.pending().pending_count() == 0 {
            tokio::task::yield_now().await;
        }
        client.shutdown();
        assert_eq!(waiter.await.unwrap().unwrap(), Value::I32(0));
    }

    // =========================================================================
    // TIMEOUTS
    // =========================================================================

    #[tokio::test]
    async fn test_timeout_then_late_reply_is_a_miss() {
        let (client, server) = peer_pair(types(), RpcConfig::default());
        server.register(slow(), Arc::new(Slow(Duration::from_millis(200))));

        let err = client
            .call_with_timeout(&slow(), &[], Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Timeout { ref method, .. } if method == "Slow"));
        assert_eq!(client.pending().pending_count(), 0);
        assert_eq!(client.pending().snapshot().timeouts, 1);

        tokio::time::timeout(Duration::from_secs(2), async {
            while client.pending().snapshot().misses == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(client.metrics().snapshot().replies_matched, 0);
    }

    #[tokio::test]
    async fn test_default_timeout_from_config() {
        let config = RpcConfigBuilder::new()
            .default_timeout(Duration::from_millis(30))
            .build()
            .unwrap();
        let (client, server) = peer_pair(types(), config);
        server.register(slow(), Arc::new(Slow(Duration::from_secs(5))));

        let err = client.call(&slow(), &[]).await.unwrap_err();
        assert!(matches!(
            err,
            RpcError::Timeout { after, .. } if after == Duration::from_millis(30)
        ));
        assert!(!err.is_local());
    }

    // =========================================================================
    // LOCAL FAILURES
    // =========================================================================

    #[tokio::test]
    async fn test_closed_channel_leaves_nothing_pending() {
        let (client, server) = peer_pair(types(), RpcConfig::default());
        serve_add(&server);
        server.shutdown();

        let err = client
            .call(&add(), &[Value::I32(1), Value::I32(2)])
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Channel(ChannelError::Closed)));
        assert!(err.is_local());
        assert_eq!(client.pending().pending_count(), 0);
        assert_eq!(client.pending().snapshot().cancelled, 1);
        assert_eq!(client.metrics().snapshot().send_failures, 1);
    }

    #[tokio::test]
    async fn test_untransmittable_argument_is_never_sent() {
        let (client, server) = peer_pair(types(), RpcConfig::default());
        let sig = MethodSignature::new("Store").param(TypeTree::new("FileHandle"));
        let handle = Value::Object(Object::new("FileHandle").into_ref());

        let err = client.notify(&sig, &[handle]).unwrap_err();
        assert!(matches!(
            err,
            RpcError::Codec(CodecError::Untransmittable { ref type_name }) if type_name == "FileHandle"
        ));
        tokio::task::yield_now().await;
        assert_eq!(server.metrics().snapshot().inbound_messages, 0);
        assert_eq!(client.metrics().snapshot().encode_failures, 1);
    }

    #[tokio::test]
    async fn test_wrong_argument_count_is_rejected() {
        let (client, _server) = peer_pair(types(), RpcConfig::default());
        let err = client.call(&add(), &[Value::I32(1)]).await.unwrap_err();
        assert!(matches!(
            err,
            RpcError::Codec(CodecError::ArgumentCount { expected: 2, found: 1 })
        ));
        assert_eq!(client.pending().snapshot().registered, 0);
    }

    // =========================================================================
    // REGISTRY SCOPE
    // =========================================================================

    async fn same_handle_across_arguments(scope: RegistryScope) -> bool {
        let config = RpcConfigBuilder::new().registry_scope(scope).build().unwrap();
        let (client, server) = peer_pair(types(), config);
        let sig = MethodSignature::new("Same")
            .param(TypeTree::new("Node"))
            .param(TypeTree::new("Node"))
            .returns(TypeTree::bool());
        server.register_fn(sig.clone(), |args| {
            Ok(Value::Bool(args[0].same_handle(&args[1])))
        });

        let node = Value::Object(Object::new("Node").with_field("value", 1).into_ref());
        let result = client.call(&sig, &[node.clone(), node]).await.unwrap();
        result.as_bool().unwrap()
    }

    #[tokio::test]
    async fn test_per_argument_scope_splits_shared_object() {
        assert!(!same_handle_across_arguments(RegistryScope::PerArgument).await);
    }

    #[tokio::test]
    async fn test_per_call_scope_keeps_shared_object() {
        assert!(same_handle_across_arguments(RegistryScope::PerCall).await);
    }
}
