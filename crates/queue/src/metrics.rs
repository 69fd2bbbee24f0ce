use std::sync::atomic::{AtomicU64, Ordering};

use pulsegate_core::DropReason;

/// Lightweight in-memory counters an admin surface would read (§6.3:
/// "read-only view of queue size, in-flight count, drops-by-reason").
/// Not persisted, not exported over any wire protocol — just atomics a
/// caller embedding this crate can snapshot.
#[derive(Debug, Default)]
pub struct QueueMetrics {
    submitted: AtomicU64,
    dispatched_ok: AtomicU64,
    dropped_emergency_stop: AtomicU64,
    dropped_queue_full: AtomicU64,
    dropped_cancelled: AtomicU64,
    dropped_safety_global_rate: AtomicU64,
    dropped_safety_user_rate: AtomicU64,
    dropped_unexpected_response: AtomicU64,
    dropped_other: AtomicU64,
    failed_auth: AtomicU64,
    failed_exceeded_retries: AtomicU64,
    failed_other: AtomicU64,
}

/// Point-in-time snapshot of [`QueueMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueMetricsSnapshot {
    pub submitted: u64,
    pub dispatched_ok: u64,
    pub dropped_emergency_stop: u64,
    pub dropped_queue_full: u64,
    pub dropped_cancelled: u64,
    pub dropped_safety_global_rate: u64,
    pub dropped_safety_user_rate: u64,
    pub dropped_unexpected_response: u64,
    pub dropped_other: u64,
    pub failed_auth: u64,
    pub failed_exceeded_retries: u64,
    pub failed_other: u64,
}

impl QueueMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched_ok(&self) {
        self.dispatched_ok.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a `Dropped(reason)` terminal outcome (§7: `emergency_stop`,
    /// `queue_full`, `cancelled`, `safety_*`, `unexpected_response`).
    pub fn record_dropped(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::EmergencyStop => &self.dropped_emergency_stop,
            DropReason::QueueFull => &self.dropped_queue_full,
            DropReason::Cancelled => &self.dropped_cancelled,
            DropReason::SafetyGlobalRate => &self.dropped_safety_global_rate,
            DropReason::SafetyUserRate => &self.dropped_safety_user_rate,
            DropReason::UnexpectedResponse => &self.dropped_unexpected_response,
            DropReason::SafetyIntensity | DropReason::SafetyDuration | DropReason::Auth | DropReason::ExceededRetries => {
                &self.dropped_other
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a `Failed(reason)` terminal outcome (§7: `auth`,
    /// `exceeded_retries` — both reached a device attempt before failing
    /// terminally, unlike `Dropped`).
    pub fn record_failed(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::Auth => &self.failed_auth,
            DropReason::ExceededRetries => &self.failed_exceeded_retries,
            _ => &self.failed_other,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            dispatched_ok: self.dispatched_ok.load(Ordering::Relaxed),
            dropped_emergency_stop: self.dropped_emergency_stop.load(Ordering::Relaxed),
            dropped_queue_full: self.dropped_queue_full.load(Ordering::Relaxed),
            dropped_cancelled: self.dropped_cancelled.load(Ordering::Relaxed),
            dropped_safety_global_rate: self.dropped_safety_global_rate.load(Ordering::Relaxed),
            dropped_safety_user_rate: self.dropped_safety_user_rate.load(Ordering::Relaxed),
            dropped_unexpected_response: self.dropped_unexpected_response.load(Ordering::Relaxed),
            dropped_other: self.dropped_other.load(Ordering::Relaxed),
            failed_auth: self.failed_auth.load(Ordering::Relaxed),
            failed_exceeded_retries: self.failed_exceeded_retries.load(Ordering::Relaxed),
            failed_other: self.failed_other.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let metrics = QueueMetrics::new();
        assert_eq!(metrics.snapshot(), QueueMetricsSnapshot::default());
    }

    #[test]
    fn record_dropped_increments_the_matching_bucket() {
        let metrics = QueueMetrics::new();
        metrics.record_dropped(DropReason::QueueFull);
        metrics.record_dropped(DropReason::QueueFull);
        metrics.record_dropped(DropReason::Cancelled);
        let snap = metrics.snapshot();
        assert_eq!(snap.dropped_queue_full, 2);
        assert_eq!(snap.dropped_cancelled, 1);
    }

    #[test]
    fn unexpected_response_is_tracked_separately_from_auth() {
        let metrics = QueueMetrics::new();
        metrics.record_dropped(DropReason::UnexpectedResponse);
        metrics.record_failed(DropReason::Auth);
        let snap = metrics.snapshot();
        assert_eq!(snap.dropped_unexpected_response, 1);
        assert_eq!(snap.failed_auth, 1);
        assert_eq!(snap.dropped_other, 0);
    }

    #[test]
    fn record_failed_increments_the_matching_bucket() {
        let metrics = QueueMetrics::new();
        metrics.record_failed(DropReason::Auth);
        metrics.record_failed(DropReason::ExceededRetries);
        metrics.record_failed(DropReason::ExceededRetries);
        let snap = metrics.snapshot();
        assert_eq!(snap.failed_auth, 1);
        assert_eq!(snap.failed_exceeded_retries, 2);
    }
}
