//! Inbound dispatcher: routes every inbound message.
//!
//! A message whose leading correlation id matches a pending call is a reply:
//! the pending entry is removed and its slot completed with the remaining
//! bytes. Anything else goes to the inbound-call handler, or is dropped and
//! counted when there is none or it cannot use the message.

use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::domain::correlation::CorrelationId;
use crate::domain::envelope::read_correlation;
use crate::domain::pending::CallCorrelationTable;
use crate::domain::wire::WireReader;
use crate::metrics::{InboundKind, RpcMetrics};
use crate::ports::{InboundCallHandler, MessageSink};

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Completed the pending call with this id.
    Completed(CorrelationId),
    /// Handed to the inbound-call handler.
    Routed,
    /// Nobody could use it.
    Dropped,
}

pub struct InboundDispatcher {
    table: Arc<CallCorrelationTable>,
    metrics: Arc<RpcMetrics>,
    handler: RwLock<Option<Arc<dyn InboundCallHandler>>>,
}

impl InboundDispatcher {
    pub fn new(table: Arc<CallCorrelationTable>, metrics: Arc<RpcMetrics>) -> Self {
        Self {
            table,
            metrics,
            handler: RwLock::new(None),
        }
    }

    /// Installs or replaces the handler for unmatched messages.
    pub fn set_handler(&self, handler: Arc<dyn InboundCallHandler>) {
        *self.handler.write() = Some(handler);
    }

    pub fn clear_handler(&self) {
        *self.handler.write() = None;
    }

    pub fn table(&self) -> &Arc<CallCorrelationTable> {
        &self.table
    }

    /// Routes one message.
    pub fn dispatch(&self, message: Bytes) -> DispatchOutcome {
        let mut reader = WireReader::new(message.clone());
        let correlation_id = match read_correlation(&mut reader) {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, bytes = message.len(), "Malformed inbound envelope");
                self.table.record_miss(None);
                self.metrics.record_inbound(InboundKind::Dropped);
                return DispatchOutcome::Dropped;
            }
        };

        if let Some(id) = correlation_id {
            if self.table.complete(id, reader.rest()) {
                trace!(correlation_id = %id, "Reply matched pending call");
                self.metrics.record_inbound(InboundKind::Matched);
                return DispatchOutcome::Completed(id);
            }
        }

        let handler = self.handler.read().clone();
        match handler {
            Some(handler) => match handler.handle_call(message) {
                Ok(()) => {
                    self.metrics.record_inbound(InboundKind::Routed);
                    DispatchOutcome::Routed
                }
                Err(e) => {
                    match correlation_id {
                        Some(id) => debug!(
                            correlation_id = %id,
                            error = %e,
                            "Correlated message matches no pending call and is not a call"
                        ),
                        None => debug!(error = %e, "Uncorrelated message is not a call"),
                    }
                    self.table.record_miss(correlation_id);
                    self.metrics.record_inbound(InboundKind::Dropped);
                    DispatchOutcome::Dropped
                }
            },
            None => {
                self.table.record_miss(correlation_id);
                self.metrics.record_inbound(InboundKind::Dropped);
                DispatchOutcome::Dropped
            }
        }
    }
}

impl MessageSink for InboundDispatcher {
    fn receive(&self, message: Bytes) {
        self.dispatch(message);
    }
}
