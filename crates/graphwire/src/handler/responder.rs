//! Callee side: serves inbound calls from a table of registered methods.
//!
//! Every call that carries a correlation id gets exactly one reply. When the
//! method is unknown, the arguments do not match, or the handler fails, the
//! reply carries no result bytes so the caller is released with the default
//! value instead of waiting for its deadline. Notifications never get a
//! reply.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use crate::domain::correlation::CorrelationId;
use crate::domain::envelope::{CallCodec, MethodSignature};
use crate::domain::graph::check_assignable;
use crate::domain::value::Value;
use crate::error::{CodecError, HandlerError};
use crate::metrics::RpcMetrics;
use crate::ports::{Channel, InboundCallHandler};

/// A locally implemented remote method.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn invoke(&self, args: Vec<Value>) -> Result<Value, HandlerError>;
}

/// Adapts a synchronous closure into a [`MethodHandler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> MethodHandler for FnHandler<F>
where
    F: Fn(Vec<Value>) -> Result<Value, HandlerError> + Send + Sync,
{
    async fn invoke(&self, args: Vec<Value>) -> Result<Value, HandlerError> {
        (self.0)(args)
    }
}

#[derive(Clone)]
struct RegisteredMethod {
    signature: MethodSignature,
    handler: Arc<dyn MethodHandler>,
}

/// Method name to signature and handler.
///
/// Methods are keyed by name; registering a name again replaces it.
#[derive(Default)]
pub struct MethodTable {
    methods: DashMap<String, RegisteredMethod>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, signature: MethodSignature, handler: Arc<dyn MethodHandler>) {
        debug!(method = %signature.name, "Registered method");
        self.methods.insert(
            signature.name.clone(),
            RegisteredMethod { signature, handler },
        );
    }

    pub fn register_fn<F>(&self, signature: MethodSignature, f: F)
    where
        F: Fn(Vec<Value>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.register(signature, Arc::new(FnHandler(f)));
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.methods.remove(name).is_some()
    }

    pub fn signature(&self, name: &str) -> Option<MethodSignature> {
        self.methods.get(name).map(|m| m.signature.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    fn get(&self, name: &str) -> Option<RegisteredMethod> {
        self.methods.get(name).map(|m| m.value().clone())
    }
}

/// Sends replies for served calls.
#[derive(Clone)]
struct Replier {
    channel: Arc<dyn Channel>,
    codec: CallCodec,
    metrics: Arc<RpcMetrics>,
}

impl Replier {
    fn reply(&self, method: &str, id: Option<CorrelationId>, result: Option<Value>) {
        let Some(id) = id else {
            return;
        };
        let bytes = match result.as_ref().map(|v| self.codec.encode_reply(id, Some(v))) {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                error!(method = method, correlation_id = %id, error = %e, "Result is not transmittable");
                self.abort_bytes(id)
            }
            None => self.abort_bytes(id),
        };
        if let Err(e) = self.channel.send(bytes) {
            warn!(method = method, correlation_id = %id, error = %e, "Failed to send reply");
        }
    }

    fn abort_bytes(&self, id: CorrelationId) -> Bytes {
        // Abort replies carry no value, so encoding cannot fail.
        self.codec
            .encode_reply(id, None)
            .unwrap_or_else(|_| Bytes::new())
    }
}

/// Inbound-call handler backed by a [`MethodTable`].
pub struct Responder {
    methods: Arc<MethodTable>,
    replier: Replier,
}

impl Responder {
    pub fn new(
        channel: Arc<dyn Channel>,
        codec: CallCodec,
        methods: Arc<MethodTable>,
        metrics: Arc<RpcMetrics>,
    ) -> Self {
        Self {
            methods,
            replier: Replier {
                channel,
                codec,
                metrics,
            },
        }
    }

    pub fn methods(&self) -> &Arc<MethodTable> {
        &self.methods
    }

    fn reject(&self, method: &str, id: Option<CorrelationId>) {
        self.replier.metrics.record_call_served(method, false);
        self.replier.reply(method, id, None);
    }
}

impl InboundCallHandler for Responder {
    fn handle_call(&self, message: Bytes) -> Result<(), CodecError> {
        let codec = &self.replier.codec;
        let mut reader = codec.reader(message);
        let header = codec.read_header(&mut reader)?;
        let id = header.correlation_id;

        let Some(method) = self.methods.get(&header.method) else {
            warn!(method = %header.method, "Call to unknown method");
            self.reject(&header.method, id);
            return Ok(());
        };

        if method.signature.params != header.param_types
            || method.signature.generic_args != header.generic_args
        {
            warn!(
                method = %header.method,
                expected = ?method.signature.params,
                found = ?header.param_types,
                "Call signature does not match registered method"
            );
            self.reject(&header.method, id);
            return Ok(());
        }

        let args = match codec.read_args(&header.param_types, &mut reader) {
            Ok(args) => args,
            Err(e) => {
                warn!(method = %header.method, error = %e, "Failed to decode call arguments");
                self.reject(&header.method, id);
                return Ok(());
            }
        };

        debug!(method = %header.method, correlation_id = ?id, "Serving call");
        let replier = self.replier.clone();
        let task = async move {
            let name = method.signature.name.as_str();
            let result = match method.handler.invoke(args).await {
                Ok(value) => match check_assignable(&value, &method.signature.return_type) {
                    Ok(()) => Some(value),
                    Err(e) => {
                        error!(method = name, error = %e, "Handler returned the wrong type");
                        None
                    }
                },
                Err(e) => {
                    warn!(method = name, error = %e, "Handler failed");
                    None
                }
            };
            replier.metrics.record_call_served(name, result.is_some());
            replier.reply(name, id, result);
        };

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(_) => futures::executor::block_on(task),
        }
        Ok(())
    }
}
