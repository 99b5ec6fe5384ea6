//! In-process channel pair.
//!
//! Two connected endpoints backed by unbounded `tokio::sync::mpsc` queues.
//! A pump task per endpoint drains inbound messages into the installed sink.
//! Messages sent before a sink is installed are queued, not lost.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::ChannelError;
use crate::ports::{Channel, MessageSink};

/// One end of an in-memory connection.
pub struct MemoryChannel {
    name: String,
    outbound: mpsc::UnboundedSender<Bytes>,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<Bytes>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    /// Shared by both ends; closing either end closes the connection.
    closed: Arc<AtomicBool>,
    sent: AtomicU64,
    delivered: Arc<AtomicU64>,
}

impl MemoryChannel {
    /// Create two connected endpoints.
    pub fn pair() -> (Self, Self) {
        Self::named_pair("left", "right")
    }

    /// Same as [`MemoryChannel::pair`] with endpoint names for logging.
    pub fn named_pair(left: &str, right: &str) -> (Self, Self) {
        let (to_right, from_left) = mpsc::unbounded_channel();
        let (to_left, from_right) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        (
            Self::endpoint(left, to_right, from_right, closed.clone()),
            Self::endpoint(right, to_left, from_left, closed),
        )
    }

    fn endpoint(
        name: &str,
        outbound: mpsc::UnboundedSender<Bytes>,
        inbound: mpsc::UnboundedReceiver<Bytes>,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            name: name.to_string(),
            outbound,
            inbound: Mutex::new(Some(inbound)),
            pump: Mutex::new(None),
            closed,
            sent: AtomicU64::new(0),
            delivered: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Messages accepted by `send` on this end.
    pub fn messages_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Messages handed to this end's sink.
    pub fn messages_delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Closes the connection for both ends and stops this end's pump.
    pub fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(channel = %self.name, "Memory channel closed");
        }
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }
}

impl Channel for MemoryChannel {
    fn send(&self, message: Bytes) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        let len = message.len();
        self.outbound
            .send(message)
            .map_err(|_| ChannelError::Closed)?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        trace!(channel = %self.name, bytes = len, "Queued message");
        Ok(())
    }

    fn set_sink(&self, sink: Arc<dyn MessageSink>) -> Result<(), ChannelError> {
        let mut inbound = self.inbound.lock();
        if inbound.is_none() {
            return Err(ChannelError::SinkAlreadySet);
        }
        let handle = Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;
        let Some(mut rx) = inbound.take() else {
            return Err(ChannelError::SinkAlreadySet);
        };

        let closed = self.closed.clone();
        let delivered = self.delivered.clone();
        let name = self.name.clone();
        let pump = handle.spawn(async move {
            while let Some(message) = rx.recv().await {
                if closed.load(Ordering::Acquire) {
                    break;
                }
                delivered.fetch_add(1, Ordering::Relaxed);
                sink.receive(message);
            }
            debug!(channel = %name, "Memory channel pump stopped");
        });
        *self.pump.lock() = Some(pump);
        Ok(())
    }

    fn close(&self) {
        self.shutdown();
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get_mut().take() {
            pump.abort();
        }
    }
}

impl std::fmt::Debug for MemoryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChannel")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}
