//! Single-assignment completion slot.
//!
//! The dispatcher writes the reply bytes exactly once; the waiting caller
//! either suspends on it cooperatively or blocks its thread. Empty bytes
//! mean the call was aborted.

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

struct Inner {
    value: Mutex<Option<Bytes>>,
    cond: Condvar,
    notify: Notify,
}

/// Shared handle to one pending result.
#[derive(Clone)]
pub struct CompletionSlot {
    inner: Arc<Inner>,
}

impl CompletionSlot {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                value: Mutex::new(None),
                cond: Condvar::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// Stores `bytes` and wakes the waiter. Returns false if already completed.
    pub fn complete(&self, bytes: Bytes) -> bool {
        {
            let mut value = self.inner.value.lock();
            if value.is_some() {
                return false;
            }
            *value = Some(bytes);
        }
        self.inner.cond.notify_all();
        self.inner.notify.notify_waiters();
        true
    }

    /// Completes with the empty abort sentinel.
    pub fn abort(&self) -> bool {
        self.complete(Bytes::new())
    }

    pub fn is_completed(&self) -> bool {
        self.inner.value.lock().is_some()
    }

    /// Completed bytes, if any, without waiting.
    pub fn peek(&self) -> Option<Bytes> {
        self.inner.value.lock().clone()
    }

    /// Suspends until completion or `timeout`. `None` means the deadline passed.
    pub async fn wait(&self, timeout: Duration) -> Option<Bytes> {
        let waiting = async {
            loop {
                // Register interest before checking, so a completion between
                // the check and the await is not lost.
                let notified = self.inner.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if let Some(bytes) = self.peek() {
                    return bytes;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, waiting).await.ok()
    }

    /// Blocks the current thread until completion or `timeout`.
    ///
    /// A timeout too large to express as a deadline waits indefinitely.
    pub fn wait_blocking(&self, timeout: Duration) -> Option<Bytes> {
        let deadline = Instant::now().checked_add(timeout);
        let mut value = self.inner.value.lock();
        while value.is_none() {
            match deadline {
                Some(deadline) => {
                    if self.inner.cond.wait_until(&mut value, deadline).timed_out() {
                        break;
                    }
                }
                None => self.inner.cond.wait(&mut value),
            }
        }
        value.clone()
    }
}

impl Default for CompletionSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CompletionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSlot")
            .field("completed", &self.is_completed())
            .finish()
    }
}
