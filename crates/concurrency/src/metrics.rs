//! Transaction counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of a manager's counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionMetrics {
    /// Resource handles begun (new transactions)
    pub total_begun: u64,
    /// New transactions committed
    pub total_committed: u64,
    /// New transactions rolled back (including unexpected rollbacks)
    pub total_rolled_back: u64,
    /// Commits refused because the transaction was rollback-only
    pub total_unexpected_rollbacks: u64,
    /// Invocations that joined an existing transaction
    pub total_participations: u64,
    /// Savepoints created for nested invocations
    pub total_savepoints: u64,
    /// Nested invocations rolled back to their savepoint
    pub total_savepoint_rollbacks: u64,
    /// Transactions suspended by `RequiresNew` / `NotSupported`
    pub total_suspensions: u64,
    /// New transactions currently running
    pub active_count: u64,
    /// Commit success rate (0.0 - 1.0)
    pub commit_rate: f64,
}

#[derive(Debug, Default)]
pub(crate) struct MetricsRecorder {
    begun: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
    unexpected_rollbacks: AtomicU64,
    participations: AtomicU64,
    savepoints: AtomicU64,
    savepoint_rollbacks: AtomicU64,
    suspensions: AtomicU64,
}

impl MetricsRecorder {
    pub(crate) fn record_begin(&self) {
        self.begun.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unexpected_rollback(&self) {
        self.unexpected_rollbacks.fetch_add(1, Ordering::Relaxed);
        self.record_rollback();
    }

    pub(crate) fn record_participation(&self) {
        self.participations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_savepoint(&self) {
        self.savepoints.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_savepoint_rollback(&self) {
        self.savepoint_rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suspension(&self) {
        self.suspensions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> TransactionMetrics {
        let begun = self.begun.load(Ordering::Relaxed);
        let committed = self.committed.load(Ordering::Relaxed);
        let rolled_back = self.rolled_back.load(Ordering::Relaxed);
        let completed = committed + rolled_back;
        TransactionMetrics {
            total_begun: begun,
            total_committed: committed,
            total_rolled_back: rolled_back,
            total_unexpected_rollbacks: self.unexpected_rollbacks.load(Ordering::Relaxed),
            total_participations: self.participations.load(Ordering::Relaxed),
            total_savepoints: self.savepoints.load(Ordering::Relaxed),
            total_savepoint_rollbacks: self.savepoint_rollbacks.load(Ordering::Relaxed),
            total_suspensions: self.suspensions.load(Ordering::Relaxed),
            active_count: begun.saturating_sub(completed),
            commit_rate: if completed == 0 {
                1.0
            } else {
                committed as f64 / completed as f64
            },
        }
    }
}
