use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use pulsegate_core::{DropReason, ItemStatus};
use pulsegate_device::{DeviceError, DynDeviceBackend};
use pulsegate_pattern::PatternEngine;
use pulsegate_safety::{Decision, ProposedCommand, SafetyArbiter};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::config::DispatcherConfig;
use crate::queue::CommandQueue;

/// Owns the worker pool that drains [`CommandQueue`] (§4.3). Each worker
/// runs the dispatch loop independently; all share the queue, the safety
/// arbiter, the device backend, and the pattern engine (for cancellation
/// checks) through `Arc` handles.
pub struct Dispatcher {
    queue: Arc<CommandQueue>,
    arbiter: Arc<SafetyArbiter>,
    device: Arc<dyn DynDeviceBackend>,
    patterns: Arc<PatternEngine>,
    config: DispatcherConfig,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        queue: Arc<CommandQueue>,
        arbiter: Arc<SafetyArbiter>,
        device: Arc<dyn DynDeviceBackend>,
        patterns: Arc<PatternEngine>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            queue,
            arbiter,
            device,
            patterns,
            config,
        }
    }

    /// Spawn `config.worker_count` dispatch loops. Returns their join
    /// handles; dropping them does not stop the workers (they run until the
    /// process exits or are aborted explicitly).
    pub fn spawn(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        (0..self.config.worker_count)
            .map(|worker_id| {
                let dispatcher = Arc::clone(&self);
                tokio::spawn(async move { dispatcher.run_worker(worker_id).await })
            })
            .collect()
    }

    async fn run_worker(&self, worker_id: usize) {
        loop {
            self.queue.latch().wait_for_clear().await;

            let now = Utc::now();
            let Some(mut item) = self.queue.pop_ready(now) else {
                // Nothing ready right now. Wait for either a new submission
                // or the earliest scheduled item to come due, whichever is
                // sooner, so a not-yet-ready high-priority item never blocks
                // a ready lower-priority one behind it.
                match self.queue.earliest_wait(now) {
                    Some(wait_for) => {
                        tokio::select! {
                            () = self.queue.notified() => {},
                            () = tokio::time::sleep(wait_for) => {},
                        }
                    }
                    None => self.queue.notified().await,
                }
                continue;
            };

            if let Some(execution_id) = item.execution_id {
                if self.patterns.is_cancelled(execution_id) {
                    self.queue.settle(&mut item, ItemStatus::Dropped { reason: DropReason::Cancelled });
                    continue;
                }
            }

            if self.queue.is_emergency_stopped() {
                self.queue.settle(&mut item, ItemStatus::Dropped { reason: DropReason::EmergencyStop });
                continue;
            }

            debug!(worker_id, item = %item.id, "dispatcher: considering item");
            self.dispatch_with_retries(item).await;
        }
    }

    async fn dispatch_with_retries(&self, mut item: pulsegate_core::CommandItem) {
        let deadline = Instant::now() + self.config.retry.item_budget;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            item.attempts = attempt;

            let decision = self.arbiter.validate(
                ProposedCommand {
                    intensity: item.intensity,
                    duration_ms: item.duration_ms,
                },
                None,
                &item.origin_user_id,
                Utc::now(),
            );

            let (adjusted_intensity, adjusted_duration_ms) = match decision {
                Decision::Allow {
                    adjusted_intensity,
                    adjusted_duration_ms,
                } => (adjusted_intensity, adjusted_duration_ms),
                Decision::Deny(reason) => {
                    self.queue.settle(&mut item, ItemStatus::Dropped { reason });
                    return;
                }
            };

            item.status = ItemStatus::InFlight { attempt };

            let result = self
                .device
                .send(&item.device_id, item.command_kind, adjusted_intensity, adjusted_duration_ms)
                .await;

            match result {
                Ok(()) => {
                    self.arbiter.record_dispatch(&item.origin_user_id, Utc::now());
                    self.queue.settle(&mut item, ItemStatus::Done);
                    return;
                }
                Err(err) if !err.is_retryable() => {
                    error!(item = %item.id, error = %err, "dispatcher: non-retryable device error");
                    let status = match err {
                        DeviceError::Auth => ItemStatus::Failed { reason: DropReason::Auth },
                        _ => ItemStatus::Dropped { reason: DropReason::UnexpectedResponse },
                    };
                    self.queue.settle(&mut item, status);
                    return;
                }
                Err(err) => {
                    if attempt > self.config.retry.max_retries || Instant::now() >= deadline {
                        error!(item = %item.id, attempt, "dispatcher: retries exhausted");
                        self.queue.settle(&mut item, ItemStatus::Failed { reason: DropReason::ExceededRetries });
                        return;
                    }
                    let backoff = err.retry_after().unwrap_or_else(|| self.config.retry.backoff_for_attempt(attempt));
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    tokio::time::sleep(backoff.min(remaining)).await;
                }
            }
        }
    }
}
