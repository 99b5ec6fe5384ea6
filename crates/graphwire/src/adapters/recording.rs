//! Channel that records outbound messages instead of transmitting them.
//!
//! Inbound delivery is driven by hand with [`RecordingChannel::deliver`],
//! which makes reply ordering and timing fully deterministic in tests.

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::ChannelError;
use crate::ports::{Channel, MessageSink};

#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<Bytes>>,
    sink: RwLock<Option<Arc<dyn MessageSink>>>,
    fail_sends: AtomicBool,
    closed: AtomicBool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later `send` fail with `SendFailed`.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::Release);
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn last_sent(&self) -> Option<Bytes> {
        self.sent.lock().last().cloned()
    }

    pub fn take_sent(&self) -> Vec<Bytes> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Hands `message` to the installed sink on the current thread.
    ///
    /// Returns false when no sink is installed.
    pub fn deliver(&self, message: Bytes) -> bool {
        let sink = self.sink.read().clone();
        match sink {
            Some(sink) => {
                sink.receive(message);
                true
            }
            None => false,
        }
    }

    pub fn has_sink(&self) -> bool {
        self.sink.read().is_some()
    }
}

impl Channel for RecordingChannel {
    fn send(&self, message: Bytes) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChannelError::Closed);
        }
        if self.fail_sends.load(Ordering::Acquire) {
            return Err(ChannelError::SendFailed("injected failure".into()));
        }
        self.sent.lock().push(message);
        Ok(())
    }

    fn set_sink(&self, sink: Arc<dyn MessageSink>) -> Result<(), ChannelError> {
        let mut slot = self.sink.write();
        if slot.is_some() {
            return Err(ChannelError::SinkAlreadySet);
        }
        *slot = Some(sink);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
