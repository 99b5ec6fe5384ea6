//! One end of a connection, fully wired.
//!
//! A [`Peer`] owns a correlation table, a caller, an inbound dispatcher and a
//! responder, all sharing one channel and one type registry. Constructing it
//! installs the dispatcher as the channel's sink, so a peer must be built
//! inside a tokio runtime when the channel delivers through tasks.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::domain::config::RpcConfig;
use crate::domain::envelope::{CallCodec, MethodSignature};
use crate::domain::pending::{cleanup_task, CallCorrelationTable};
use crate::domain::transmittable::Transmittable;
use crate::domain::types::TypeRegistry;
use crate::domain::value::Value;
use crate::error::{ChannelError, HandlerError, RpcResult};
use crate::handler::{InboundDispatcher, MethodHandler, MethodTable, Responder};
use crate::metrics::RpcMetrics;
use crate::ports::Channel;
use crate::service::caller::RpcCaller;

pub struct Peer {
    channel: Arc<dyn Channel>,
    types: Arc<TypeRegistry>,
    config: RpcConfig,
    caller: RpcCaller,
    dispatcher: Arc<InboundDispatcher>,
    methods: Arc<MethodTable>,
    cleanup: Mutex<Option<JoinHandle<()>>>,
}

impl Peer {
    pub fn new(
        channel: Arc<dyn Channel>,
        types: Arc<TypeRegistry>,
        config: RpcConfig,
    ) -> RpcResult<Self> {
        Self::with_metrics(channel, types, config, Arc::new(RpcMetrics::new()))
    }

    /// Builds a peer reporting into `metrics`, e.g. one carrying a recorder.
    pub fn with_metrics(
        channel: Arc<dyn Channel>,
        types: Arc<TypeRegistry>,
        config: RpcConfig,
        metrics: Arc<RpcMetrics>,
    ) -> RpcResult<Self> {
        config.validate()?;

        let table = Arc::new(CallCorrelationTable::new(config.default_timeout));
        let codec = CallCodec::from_config(types.clone(), &config);
        let methods = Arc::new(MethodTable::new());

        let dispatcher = Arc::new(InboundDispatcher::new(table.clone(), metrics.clone()));
        let responder = Responder::new(
            channel.clone(),
            codec.clone(),
            methods.clone(),
            metrics.clone(),
        );
        dispatcher.set_handler(Arc::new(responder));
        channel.set_sink(dispatcher.clone())?;

        let caller = RpcCaller::new(channel.clone(), table, codec, metrics);

        info!(
            registry_scope = ?config.registry_scope,
            default_timeout_ms = config.default_timeout.as_millis(),
            "Peer ready"
        );

        Ok(Self {
            channel,
            types,
            config,
            caller,
            dispatcher,
            methods,
            cleanup: Mutex::new(None),
        })
    }

    pub fn caller(&self) -> &RpcCaller {
        &self.caller
    }

    pub fn dispatcher(&self) -> &Arc<InboundDispatcher> {
        &self.dispatcher
    }

    pub fn methods(&self) -> &Arc<MethodTable> {
        &self.methods
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    pub fn pending(&self) -> &Arc<CallCorrelationTable> {
        self.caller.pending()
    }

    pub fn metrics(&self) -> &Arc<RpcMetrics> {
        self.caller.metrics()
    }

    /// Serves `signature` with `handler`. Replaces any method of that name.
    pub fn register(&self, signature: MethodSignature, handler: Arc<dyn MethodHandler>) {
        self.methods.register(signature, handler);
    }

    pub fn register_fn<F>(&self, signature: MethodSignature, f: F)
    where
        F: Fn(Vec<Value>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.methods.register_fn(signature, f);
    }

    pub async fn call(&self, signature: &MethodSignature, args: &[Value]) -> RpcResult<Value> {
        self.caller.call(signature, args).await
    }

    pub async fn call_with_timeout(
        &self,
        signature: &MethodSignature,
        args: &[Value],
        timeout: Duration,
    ) -> RpcResult<Value> {
        self.caller
            .call_with_timeout(signature, args, Some(timeout))
            .await
    }

    pub async fn call_typed<R: Transmittable>(
        &self,
        signature: &MethodSignature,
        args: &[Value],
    ) -> RpcResult<R> {
        self.caller.call_typed(signature, args).await
    }

    pub fn call_blocking(&self, signature: &MethodSignature, args: &[Value]) -> RpcResult<Value> {
        self.caller.call_blocking(signature, args)
    }

    pub fn notify(&self, signature: &MethodSignature, args: &[Value]) -> RpcResult<()> {
        self.caller.notify(signature, args)
    }

    /// Starts the periodic sweep of expired pending calls.
    ///
    /// Returns false when already running. Requires a tokio runtime.
    pub fn spawn_cleanup(&self) -> Result<bool, ChannelError> {
        let mut cleanup = self.cleanup.lock();
        if cleanup.is_some() {
            return Ok(false);
        }
        let handle = Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;
        *cleanup = Some(handle.spawn(cleanup_task(
            self.pending().clone(),
            self.config.sweep_interval,
        )));
        debug!(interval_ms = self.config.sweep_interval.as_millis(), "Started pending-call sweep");
        Ok(true)
    }

    /// Closes the channel and releases every waiting caller with the abort
    /// sentinel. Returns how many calls were released.
    pub fn shutdown(&self) -> usize {
        if let Some(task) = self.cleanup.lock().take() {
            task.abort();
        }
        self.channel.close();
        self.dispatcher.clear_handler();
        let released = self.pending().abort_all();
        info!(released = released, "Peer shut down");
        released
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        if let Some(task) = self.cleanup.get_mut().take() {
            task.abort();
        }
    }
}
