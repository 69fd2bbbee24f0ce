use std::sync::Mutex;

use chrono::Utc;
use pulsegate_core::{CommandItem, DropReason, ItemStatus};
use pulsegate_safety::EmergencyLatch;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::heap::PriorityQueue;
use crate::metrics::QueueMetrics;
use crate::outcome::OutcomeSink;

/// The bounded, priority-ordered in-memory queue of command items (§3, §4.3).
/// Workers (`dispatcher.rs`) pop from it; `M`/`P` push into it via
/// [`CommandQueue::submit`].
pub struct CommandQueue {
    heap: Mutex<PriorityQueue>,
    notify: Notify,
    latch: EmergencyLatch,
    metrics: QueueMetrics,
    outcomes: Box<dyn OutcomeSink>,
}

impl CommandQueue {
    #[must_use]
    pub fn new(capacity: usize, latch: EmergencyLatch, outcomes: Box<dyn OutcomeSink>) -> Self {
        Self {
            heap: Mutex::new(PriorityQueue::new(capacity)),
            notify: Notify::new(),
            latch,
            metrics: QueueMetrics::new(),
            outcomes,
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.lock().expect("queue mutex poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Submit a new item for dispatch (§4.3). Refuses with
    /// `Dropped(emergency_stop)` if the latch is engaged, or
    /// `Dropped(queue_full)` if the queue is at `Qmax`; both refusals settle
    /// the item immediately and record it with the outcome sink.
    pub fn submit(&self, mut item: CommandItem) -> Result<(), DropReason> {
        self.metrics.record_submitted();

        if self.latch.is_engaged() {
            self.settle(&mut item, ItemStatus::Dropped { reason: DropReason::EmergencyStop });
            return Err(DropReason::EmergencyStop);
        }

        let mut heap = self.heap.lock().expect("queue mutex poisoned");
        let rejected = heap.push(item);
        drop(heap);
        if let Some(mut item) = rejected {
            self.settle(&mut item, ItemStatus::Dropped { reason: DropReason::QueueFull });
            return Err(DropReason::QueueFull);
        }
        self.notify.notify_waiters();
        Ok(())
    }

    /// Pop the highest-priority item that is ready to dispatch at `now`, if
    /// any, leaving not-yet-ready items queued (§4.3 step 1-2). Does
    /// **not** check the latch — callers (`dispatcher.rs`) are responsible
    /// for that.
    pub(crate) fn pop_ready(&self, now: chrono::DateTime<Utc>) -> Option<CommandItem> {
        self.heap.lock().expect("queue mutex poisoned").pop_ready(now)
    }

    /// How long a worker should sleep before re-checking the queue when
    /// [`Self::pop_ready`] found nothing ready: the time remaining until the
    /// earliest `scheduledNotBefore` among queued items, or `None` if no
    /// item has one (the worker should just wait for a submission
    /// notification instead).
    pub(crate) fn earliest_wait(&self, now: chrono::DateTime<Utc>) -> Option<std::time::Duration> {
        let earliest = self.heap.lock().expect("queue mutex poisoned").earliest_not_before(now)?;
        Some((earliest - now).to_std().unwrap_or(std::time::Duration::ZERO))
    }

    pub(crate) async fn notified(&self) {
        self.notify.notified().await;
    }

    pub(crate) fn notify_all(&self) {
        self.notify.notify_waiters();
    }

    /// Mark `item` with a terminal status, report it to the outcome sink,
    /// and record the outcome in metrics.
    pub(crate) fn settle(&self, item: &mut CommandItem, status: ItemStatus) {
        match &status {
            ItemStatus::Dropped { reason } => {
                self.metrics.record_dropped(*reason);
                warn!(item = %item.id, reason = %reason, "queue: item dropped");
            }
            ItemStatus::Failed { reason } => {
                self.metrics.record_failed(*reason);
                error!(item = %item.id, reason = %reason, "queue: item failed");
            }
            ItemStatus::Done => {
                self.metrics.record_dispatched_ok();
                info!(item = %item.id, "queue: item dispatched successfully");
            }
            ItemStatus::Pending | ItemStatus::Scheduled | ItemStatus::InFlight { .. } => {}
        }
        item.status = status;
        self.outcomes.record(item.clone());
    }

    /// Engage the emergency-stop latch, drain every queued item to
    /// `Dropped(emergency_stop)`, and notify parked workers so they observe
    /// the transition immediately (§4.3, §9).
    pub fn trigger_emergency_stop(&self) {
        self.latch.trigger();
        let drained = {
            let mut heap = self.heap.lock().expect("queue mutex poisoned");
            heap.drain_all()
        };
        for mut item in drained {
            self.settle(&mut item, ItemStatus::Dropped { reason: DropReason::EmergencyStop });
        }
        self.notify.notify_waiters();
    }

    /// Clear the latch; does not resurrect previously dropped items (§4.3).
    pub fn clear_emergency_stop(&self) {
        self.latch.clear();
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_emergency_stopped(&self) -> bool {
        self.latch.is_engaged()
    }

    #[must_use]
    pub fn latch(&self) -> EmergencyLatch {
        self.latch.clone()
    }
}
