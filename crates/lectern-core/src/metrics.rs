//! Global atomic counters for gateway observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters; no allocations, no locking.
pub struct Metrics {
    transactions_committed: AtomicU64,
    actions_dispatched: AtomicU64,
    document_reads: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            transactions_committed: AtomicU64::new(0),
            actions_dispatched: AtomicU64::new(0),
            document_reads: AtomicU64::new(0),
        }
    }

    pub fn inc_transactions_committed(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "transactions_committed", "counter incremented");
    }

    /// Add `n` dispatched actions (one batch may carry several).
    pub fn add_actions_dispatched(&self, n: u64) {
        self.actions_dispatched.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "actions_dispatched", n, "counter incremented");
    }

    pub fn inc_document_reads(&self) {
        self.document_reads.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "document_reads", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            transactions_committed = self.transactions_committed(),
            actions_dispatched = self.actions_dispatched(),
            document_reads = self.document_reads(),
        );
    }

    pub fn transactions_committed(&self) -> u64 {
        self.transactions_committed.load(Ordering::Relaxed)
    }

    pub fn actions_dispatched(&self) -> u64 {
        self.actions_dispatched.load(Ordering::Relaxed)
    }

    pub fn document_reads(&self) -> u64 {
        self.document_reads.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.transactions_committed.store(0, Ordering::Relaxed);
        self.actions_dispatched.store(0, Ordering::Relaxed);
        self.document_reads.store(0, Ordering::Relaxed);
    }
}
