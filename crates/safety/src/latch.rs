use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Process-wide emergency-stop latch (§3, §9). Promoted from the source's
/// ad-hoc settings bit to a first-class latch with wake-up semantics: workers
/// parked on [`EmergencyLatch::wait_for_clear`] are woken the instant
/// [`EmergencyLatch::clear`] runs, rather than polling.
///
/// Owned by the Safety Arbiter (§5: "the latch is owned by S"); the Command
/// Queue and the admin surface both observe it through a cloned handle.
#[derive(Debug, Clone)]
pub struct EmergencyLatch {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    engaged: AtomicBool,
    notify: Notify,
}

impl Default for EmergencyLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl EmergencyLatch {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                engaged: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    #[must_use]
    pub fn is_engaged(&self) -> bool {
        self.inner.engaged.load(Ordering::Acquire)
    }

    /// Engage the latch. Idempotent: a second call while already engaged is
    /// a no-op (§8: "`triggerEmergencyStop` is idempotent").
    pub fn trigger(&self) {
        self.inner.engaged.store(true, Ordering::Release);
    }

    /// Clear the latch and wake every worker parked in
    /// [`Self::wait_for_clear`]. Idempotent (§8).
    pub fn clear(&self) {
        self.inner.engaged.store(false, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    /// Resolve once the latch is clear. Returns immediately if already clear.
    pub async fn wait_for_clear(&self) {
        loop {
            if !self.is_engaged() {
                return;
            }
            let notified = self.inner.notify.notified();
            if !self.is_engaged() {
                return;
            }
            notified.await;
        }
    }
}
