//! Call Correlation Table - matches inbound replies to waiting callers.
//!
//! Maps correlation IDs to the completion slot of each outstanding call.

use crate::domain::correlation::CorrelationId;
use crate::domain::slot::CompletionSlot;
use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A call waiting for its reply
struct PendingCall {
    /// Slot the reply bytes are written to
    slot: CompletionSlot,
    /// When the call was registered
    created_at: Instant,
    /// Method name (for logging)
    method: String,
    /// Deadline for this call
    timeout: Duration,
}

/// Statistics for the correlation table
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total calls registered
    pub total_registered: AtomicU64,
    /// Total calls completed by a reply
    pub total_completed: AtomicU64,
    /// Total calls completed with the abort sentinel
    pub total_aborted: AtomicU64,
    /// Total calls removed without completion
    pub total_cancelled: AtomicU64,
    /// Total calls that passed their deadline
    pub total_timeouts: AtomicU64,
    /// Total replies whose id matched nothing
    pub total_misses: AtomicU64,
    /// Misses that carried a correlation id, i.e. late or unknown replies
    pub total_late_replies: AtomicU64,
}

/// Point-in-time copy of [`PendingStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PendingStatsSnapshot {
    pub registered: u64,
    pub completed: u64,
    pub aborted: u64,
    pub cancelled: u64,
    pub timeouts: u64,
    pub misses: u64,
    pub late_replies: u64,
    pub pending: u64,
}

/// Thread-safe table of outstanding result-bearing calls.
///
/// Flow:
/// 1. Caller encodes the call, minting a CorrelationId
/// 2. Caller calls `register()` to get a completion slot
/// 3. Caller transmits the message
/// 4. Dispatcher receives the reply and calls `complete()`
/// 5. Caller waits on the slot or times out
///
/// Each entry is removed exactly once: by `complete`, `abort`, `cancel`,
/// `mark_timed_out` or `remove_expired`, whichever wins the removal.
pub struct CallCorrelationTable {
    /// Map of correlation ID to pending call
    pending: DashMap<CorrelationId, PendingCall>,
    /// Default timeout
    default_timeout: Duration,
    /// Statistics
    stats: Arc<PendingStats>,
}

impl CallCorrelationTable {
    /// Create a new correlation table
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            default_timeout,
            stats: Arc::new(PendingStats::default()),
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Register a pending call and get the slot its reply will complete.
    pub fn register(
        &self,
        correlation_id: CorrelationId,
        method: &str,
        timeout: Option<Duration>,
    ) -> CompletionSlot {
        let slot = CompletionSlot::new();
        let call = PendingCall {
            slot: slot.clone(),
            created_at: Instant::now(),
            method: method.to_string(),
            timeout: timeout.unwrap_or(self.default_timeout),
        };

        self.pending.insert(correlation_id, call);
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(
            correlation_id = %correlation_id,
            method = method,
            "Registered pending call"
        );

        slot
    }

    /// Complete a pending call with the reply's remaining bytes.
    ///
    /// Atomic get-and-delete. Returns false if the id is unknown; the caller
    /// decides whether that is a miss (see [`Self::record_miss`]).
    pub fn complete(&self, correlation_id: CorrelationId, result: Bytes) -> bool {
        let Some((_, call)) = self.pending.remove(&correlation_id) else {
            return false;
        };
        let response_time = call.created_at.elapsed();
        let aborted = result.is_empty();

        if call.slot.complete(result) {
            if aborted {
                self.stats.total_aborted.fetch_add(1, Ordering::Relaxed);
            } else {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
            }
            debug!(
                correlation_id = %correlation_id,
                method = call.method,
                response_time_ms = response_time.as_millis(),
                aborted,
                "Completed pending call"
            );
            true
        } else {
            debug!(
                correlation_id = %correlation_id,
                method = call.method,
                "Pending call slot already completed"
            );
            false
        }
    }

    /// Records a reply that matched no pending call.
    pub fn record_miss(&self, correlation_id: Option<CorrelationId>) {
        self.stats.total_misses.fetch_add(1, Ordering::Relaxed);
        match correlation_id {
            Some(id) => {
                self.stats.total_late_replies.fetch_add(1, Ordering::Relaxed);
                warn!(
                    correlation_id = %id,
                    "Late reply: correlation ID is no longer pending"
                )
            }
            None => warn!("Dropped inbound message without correlation"),
        }
    }

    /// Releases one waiter with the abort sentinel.
    pub fn abort(&self, correlation_id: &CorrelationId) -> bool {
        self.complete(*correlation_id, Bytes::new())
    }

    /// Releases every waiter with the abort sentinel. Returns the count.
    pub fn abort_all(&self) -> usize {
        let ids = self.pending_ids();
        let aborted = ids.iter().filter(|id| self.abort(id)).count();
        if aborted > 0 {
            warn!(aborted = aborted, "Aborted all pending calls");
        }
        aborted
    }

    /// Cancel a pending call without completing it
    pub fn cancel(&self, correlation_id: &CorrelationId) -> bool {
        if self.pending.remove(correlation_id).is_some() {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Removes a call whose waiter gave up at its deadline.
    pub fn mark_timed_out(&self, correlation_id: &CorrelationId) -> bool {
        if let Some((_, call)) = self.pending.remove(correlation_id) {
            self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
            warn!(
                correlation_id = %correlation_id,
                method = call.method,
                timeout_ms = call.timeout.as_millis(),
                "Pending call timed out"
            );
            true
        } else {
            false
        }
    }

    /// Remove expired calls (TTL cleanup).
    ///
    /// Returns the number of calls removed.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.pending.retain(|id, call| {
            let elapsed = now.duration_since(call.created_at);
            if elapsed > call.timeout {
                warn!(
                    correlation_id = %id,
                    method = call.method,
                    elapsed_ms = elapsed.as_millis(),
                    timeout_ms = call.timeout.as_millis(),
                    "Removing expired pending call"
                );
                self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                removed += 1;
                false // Remove
            } else {
                true // Keep
            }
        });

        removed
    }

    /// Get number of currently pending calls
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if a correlation ID is pending
    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains_key(correlation_id)
    }

    pub fn pending_ids(&self) -> Vec<CorrelationId> {
        self.pending.iter().map(|entry| *entry.key()).collect()
    }

    /// Get statistics
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }

    pub fn snapshot(&self) -> PendingStatsSnapshot {
        let s = &self.stats;
        PendingStatsSnapshot {
            registered: s.total_registered.load(Ordering::Relaxed),
            completed: s.total_completed.load(Ordering::Relaxed),
            aborted: s.total_aborted.load(Ordering::Relaxed),
            cancelled: s.total_cancelled.load(Ordering::Relaxed),
            timeouts: s.total_timeouts.load(Ordering::Relaxed),
            misses: s.total_misses.load(Ordering::Relaxed),
            late_replies: s.total_late_replies.load(Ordering::Relaxed),
            pending: self.pending.len() as u64,
        }
    }
}

/// Background task to clean up expired calls
pub async fn cleanup_task(table: Arc<CallCorrelationTable>, interval: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        let removed = table.remove_expired();
        if removed > 0 {
            debug!(removed = removed, "Cleaned up expired pending calls");
        }
    }
}
