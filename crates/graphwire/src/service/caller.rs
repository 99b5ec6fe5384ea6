//! Caller runtime: turns a method invocation into a message and, for
//! result-bearing methods, waits for and decodes the reply.
//!
//! Every call shape funnels through [`RpcCaller::transmit`]: encode (which
//! mints the correlation id), register the pending call, send. A send
//! failure cancels the registration before the error is returned.

use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::domain::correlation::CorrelationId;
use crate::domain::envelope::{CallCodec, MethodSignature};
use crate::domain::pending::CallCorrelationTable;
use crate::domain::slot::CompletionSlot;
use crate::domain::transmittable::Transmittable;
use crate::domain::value::Value;
use crate::error::{RpcError, RpcResult};
use crate::metrics::{FailureKind, RpcMetrics};
use crate::ports::Channel;

/// A transmitted call waiting for its reply.
struct InFlight {
    id: CorrelationId,
    slot: CompletionSlot,
    started: Instant,
    timeout: Duration,
}

pub struct RpcCaller {
    channel: Arc<dyn Channel>,
    table: Arc<CallCorrelationTable>,
    codec: CallCodec,
    metrics: Arc<RpcMetrics>,
}

impl RpcCaller {
    pub fn new(
        channel: Arc<dyn Channel>,
        table: Arc<CallCorrelationTable>,
        codec: CallCodec,
        metrics: Arc<RpcMetrics>,
    ) -> Self {
        Self {
            channel,
            table,
            codec,
            metrics,
        }
    }

    pub fn pending(&self) -> &Arc<CallCorrelationTable> {
        &self.table
    }

    pub fn codec(&self) -> &CallCodec {
        &self.codec
    }

    pub fn metrics(&self) -> &Arc<RpcMetrics> {
        &self.metrics
    }

    /// Sends a call to a void method. No correlation, no reply.
    pub fn notify(&self, signature: &MethodSignature, args: &[Value]) -> RpcResult<()> {
        if signature.expects_reply() {
            return Err(RpcError::ReplyExpected {
                method: signature.name.clone(),
            });
        }
        self.transmit(signature, args, None).map(|_| ())
    }

    /// Calls and suspends until the reply, the default deadline, or an abort.
    pub async fn call(&self, signature: &MethodSignature, args: &[Value]) -> RpcResult<Value> {
        self.call_with_timeout(signature, args, None).await
    }

    pub async fn call_with_timeout(
        &self,
        signature: &MethodSignature,
        args: &[Value],
        timeout: Option<Duration>,
    ) -> RpcResult<Value> {
        match self.transmit(signature, args, timeout)? {
            None => Ok(Value::Null),
            Some(call) => {
                let reply = call.slot.wait(call.timeout).await;
                self.finish(signature, call, reply)
            }
        }
    }

    /// Calls and blocks the current thread until the reply.
    ///
    /// Must not run on a thread that drives the channel's delivery, or the
    /// reply can never arrive.
    pub fn call_blocking(&self, signature: &MethodSignature, args: &[Value]) -> RpcResult<Value> {
        self.call_blocking_with_timeout(signature, args, None)
    }

    pub fn call_blocking_with_timeout(
        &self,
        signature: &MethodSignature,
        args: &[Value],
        timeout: Option<Duration>,
    ) -> RpcResult<Value> {
        match self.transmit(signature, args, timeout)? {
            None => Ok(Value::Null),
            Some(call) => {
                let reply = call.slot.wait_blocking(call.timeout);
                self.finish(signature, call, reply)
            }
        }
    }

    /// [`RpcCaller::call`] converting the result into `R`.
    pub async fn call_typed<R: Transmittable>(
        &self,
        signature: &MethodSignature,
        args: &[Value],
    ) -> RpcResult<R> {
        let value = self.call(signature, args).await?;
        Ok(R::from_value(value)?)
    }

    /// Releases a waiting call with the abort sentinel.
    pub fn abort(&self, id: &CorrelationId) -> bool {
        self.table.abort(id)
    }

    fn transmit(
        &self,
        signature: &MethodSignature,
        args: &[Value],
        timeout: Option<Duration>,
    ) -> RpcResult<Option<InFlight>> {
        let method = signature.name.as_str();
        let encode_started = Instant::now();
        let (id, bytes) = match self.codec.encode_call(signature, args) {
            Ok(encoded) => {
                self.metrics.record_encode(method, encode_started.elapsed());
                encoded
            }
            Err(e) => {
                warn!(method = method, error = %e, "Failed to encode call");
                self.metrics.record_failure(method, FailureKind::Encode);
                return Err(e.into());
            }
        };

        let in_flight = id.map(|id| {
            let timeout = timeout.unwrap_or_else(|| self.table.default_timeout());
            InFlight {
                id,
                slot: self.table.register(id, method, Some(timeout)),
                started: Instant::now(),
                timeout,
            }
        });

        let len = bytes.len();
        if let Err(e) = self.channel.send(bytes) {
            if let Some(call) = &in_flight {
                self.table.cancel(&call.id);
            }
            warn!(method = method, error = %e, "Failed to send call");
            self.metrics.record_failure(method, FailureKind::Send);
            return Err(e.into());
        }

        match &in_flight {
            Some(call) => {
                self.metrics.record_call_started(method);
                debug!(correlation_id = %call.id, method = method, bytes = len, "Sent call");
            }
            None => {
                self.metrics.record_notification(method);
                debug!(method = method, bytes = len, "Sent notification");
            }
        }
        Ok(in_flight)
    }

    fn finish(
        &self,
        signature: &MethodSignature,
        call: InFlight,
        reply: Option<Bytes>,
    ) -> RpcResult<Value> {
        let method = signature.name.as_str();
        let reply = match reply {
            Some(bytes) => bytes,
            // A reply may land between the deadline and the removal.
            None if !self.table.mark_timed_out(&call.id) && call.slot.is_completed() => {
                call.slot.peek().unwrap_or_default()
            }
            None => {
                self.metrics.record_failure(method, FailureKind::Timeout);
                return Err(RpcError::Timeout {
                    method: method.to_string(),
                    correlation_id: call.id,
                    after: call.timeout,
                });
            }
        };

        let aborted = reply.is_empty();
        self.metrics
            .record_call_completed(method, call.started.elapsed(), aborted);
        if aborted {
            debug!(correlation_id = %call.id, method = method, "Call aborted, using default result");
        }

        self.codec
            .decode_result(&signature.return_type, reply)
            .map_err(|e| {
                warn!(correlation_id = %call.id, method = method, error = %e, "Failed to decode reply");
                self.metrics.record_failure(method, FailureKind::Decode);
                RpcError::from(e)
            })
    }
}
