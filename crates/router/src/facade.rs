use std::sync::Arc;

use chrono::Utc;
use pulsegate_core::{CommandItem, Event, ItemStatus, Mapping, MappingId, Pattern};
use pulsegate_device::DynDeviceBackend;
use pulsegate_mapping::{GlobalSafetyCaps, MappingEngine, MatchedActionKind};
use pulsegate_pattern::PatternEngine;
use pulsegate_queue::{CommandQueue, Dispatcher, DispatcherConfig};
use pulsegate_safety::SafetyArbiter;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::RouterError;
use crate::normalize::{normalize, RawEventEnvelope};
use crate::patterns::PatternRegistry;

/// The single facade an ingress adapter or an admin surface would embed
/// (spec.md §2 layer R "Event Router"): owns the Mapping Engine, the pattern
/// definition registry, the Pattern/Flow Engine's execution bookkeeping, the
/// Command Queue & Dispatcher, the Safety Arbiter, and the Device Backend
/// Adapter, and wires `ingress -> R -> M -> P/Q -> S -> D` end to end.
///
/// Mirrors the teacher's `Gateway` (constructed via a builder, exposing one
/// `dispatch`-shaped entry point plus narrow admin-style accessors) scoped
/// down to this core's M/P/Q/S/D shape.
pub struct Core {
    mapping: MappingEngine,
    patterns: PatternRegistry,
    pattern_engine: Arc<PatternEngine>,
    queue: Arc<CommandQueue>,
    safety: Arc<SafetyArbiter>,
    global_caps: GlobalSafetyCaps,
    worker_handles: Vec<JoinHandle<()>>,
}

impl Core {
    /// Wire up a `Core` and spawn its dispatcher worker pool. Takes already
    /// constructed component `Arc`s so an embedder can share a `SafetyArbiter`
    /// or device backend across multiple `Core`s, or substitute a mock device
    /// backend in tests.
    #[must_use]
    pub fn spawn(safety: Arc<SafetyArbiter>, device: Arc<dyn DynDeviceBackend>, config: DispatcherConfig) -> Self {
        let global_caps = GlobalSafetyCaps {
            max_intensity: safety.config().max_intensity,
            max_duration_ms: safety.config().max_duration_ms,
        };
        let queue = Arc::new(CommandQueue::new(
            config.queue_capacity,
            safety.latch(),
            Box::new(pulsegate_queue::NullOutcomeSink),
        ));
        let pattern_engine = Arc::new(PatternEngine::new());

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&queue),
            Arc::clone(&safety),
            device,
            Arc::clone(&pattern_engine),
            config,
        ));
        let worker_handles = dispatcher.spawn();

        Self {
            mapping: MappingEngine::new(),
            patterns: PatternRegistry::new(),
            pattern_engine,
            queue,
            safety,
            global_caps,
            worker_handles,
        }
    }

    /// Same as [`Self::spawn`], but takes an already-built queue so an
    /// embedder can supply a custom [`pulsegate_queue::OutcomeSink`] (e.g. the
    /// in-memory sink an admin surface would read "recent outcomes" from,
    /// spec.md §6.3).
    #[must_use]
    pub fn spawn_with_queue(
        safety: Arc<SafetyArbiter>,
        device: Arc<dyn DynDeviceBackend>,
        queue: Arc<CommandQueue>,
        config: DispatcherConfig,
    ) -> Self {
        let global_caps = GlobalSafetyCaps {
            max_intensity: safety.config().max_intensity,
            max_duration_ms: safety.config().max_duration_ms,
        };
        let pattern_engine = Arc::new(PatternEngine::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&queue),
            Arc::clone(&safety),
            device,
            Arc::clone(&pattern_engine),
            config,
        ));
        let worker_handles = dispatcher.spawn();

        Self {
            mapping: MappingEngine::new(),
            patterns: PatternRegistry::new(),
            pattern_engine,
            queue,
            safety,
            global_caps,
            worker_handles,
        }
    }

    pub fn admit_mapping(&self, mapping: Mapping) -> Result<(), RouterError> {
        self.mapping.admit(mapping)?;
        Ok(())
    }

    pub fn remove_mapping(&self, id: &MappingId) {
        self.mapping.remove(id);
    }

    pub fn admit_pattern(&self, pattern: Pattern) -> Result<(), RouterError> {
        self.patterns.admit(pattern)?;
        Ok(())
    }

    #[must_use]
    pub fn mapping_count(&self) -> usize {
        self.mapping.len()
    }

    #[must_use]
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn queue(&self) -> &Arc<CommandQueue> {
        &self.queue
    }

    #[must_use]
    pub fn safety(&self) -> &Arc<SafetyArbiter> {
        &self.safety
    }

    /// Entry point for the ingress adapter (spec.md §6.1 `onEvent`): parse a
    /// raw, dual-schema-tolerant envelope into a normalized [`Event`] and
    /// route it. Returns the number of command items actually enqueued
    /// (items refused at submission time, e.g. `queue_full`, are not
    /// counted, but do not fail this call — they are recorded through the
    /// queue's outcome sink and metrics per spec.md §7).
    pub fn on_event(&self, raw: RawEventEnvelope) -> Result<usize, RouterError> {
        let event = normalize(raw)?;
        Ok(self.route_event(&event))
    }

    /// Route an already-normalized [`Event`] (for callers that construct
    /// `Event`s directly, e.g. tests or an ingress adapter that has already
    /// done its own normalization).
    pub fn route_event(&self, event: &Event) -> usize {
        let now = Utc::now();
        let matches = self.mapping.evaluate(event, self.global_caps, now);
        let mut enqueued = 0usize;

        // §5: "for a single event, all actions produced by M are enqueued in
        // priority order before the next event is processed" — `matches` is
        // already priority-sorted by the mapping engine, so a plain
        // sequential loop preserves that ordering at the enqueue point.
        for matched in matches {
            match matched.kind {
                MatchedActionKind::Command {
                    command_kind,
                    intensity,
                    duration_ms,
                } => {
                    let item = CommandItem {
                        id: pulsegate_core::CommandItemId::new(),
                        device_id: matched.device_id,
                        command_kind,
                        intensity,
                        duration_ms,
                        priority: matched.priority,
                        mapping_id: matched.mapping_id,
                        execution_id: None,
                        step_index: None,
                        scheduled_not_before: None,
                        origin_user_id: event.user.id.clone(),
                        origin_event_kind: event.kind,
                        submitted_at: now,
                        attempts: 0,
                        status: ItemStatus::Pending,
                    };
                    if self.queue.submit(item).is_ok() {
                        enqueued += 1;
                    }
                }
                MatchedActionKind::Pattern { pattern_id } => {
                    let Some(pattern) = self.patterns.get(&pattern_id) else {
                        error!(mapping = %matched.mapping_id, pattern = %pattern_id, "router: mapping references unknown pattern, skipping");
                        continue;
                    };
                    enqueued += self.expand_and_submit(&pattern, matched.device_id, matched.mapping_id, matched.priority, event, now);
                }
            }
        }

        enqueued
    }

    fn expand_and_submit(
        &self,
        pattern: &Pattern,
        device_id: pulsegate_core::DeviceId,
        mapping_id: MappingId,
        priority: u8,
        event: &Event,
        base_time: chrono::DateTime<Utc>,
    ) -> usize {
        let (execution_id, steps) = self.pattern_engine.expand(pattern, device_id.clone(), base_time);
        if steps.is_empty() {
            info!(pattern = %pattern.id, "router: pattern expanded to zero steps");
            return 0;
        }

        let mut enqueued = 0usize;
        for step in steps {
            let item = CommandItem {
                id: pulsegate_core::CommandItemId::new(),
                device_id: device_id.clone(),
                command_kind: step.command_kind,
                intensity: step.intensity,
                duration_ms: step.duration_ms,
                priority,
                mapping_id: mapping_id.clone(),
                execution_id: Some(execution_id),
                step_index: Some(step.step_index),
                scheduled_not_before: Some(step.scheduled_not_before),
                origin_user_id: event.user.id.clone(),
                origin_event_kind: event.kind,
                submitted_at: base_time,
                attempts: 0,
                status: ItemStatus::Pending,
            };
            match self.queue.submit(item) {
                Ok(()) => enqueued += 1,
                Err(reason) => warn!(pattern = %pattern.id, %execution_id, %reason, "router: pattern step refused at submission"),
            }
        }
        enqueued
    }

    /// Cancel a live pattern execution by id (spec.md §4.2, §4.3). A no-op
    /// for an unknown id (§8).
    pub fn cancel_execution(&self, execution_id: pulsegate_core::ExecutionId) {
        self.pattern_engine.cancel(execution_id);
    }

    /// Engage the emergency-stop latch: drains the queue and cancels every
    /// live pattern execution (spec.md §4.3).
    pub fn trigger_emergency_stop(&self) {
        self.queue.trigger_emergency_stop();
        self.pattern_engine.cancel_all();
    }

    pub fn clear_emergency_stop(&self) {
        self.queue.clear_emergency_stop();
    }

    #[must_use]
    pub fn is_emergency_stopped(&self) -> bool {
        self.queue.is_emergency_stopped()
    }

    /// Abort every dispatcher worker task. Intended for orderly shutdown in
    /// tests and the CLI; in-flight device calls are not interrupted (spec.md
    /// §5: "There is no thread-level cancellation").
    pub fn shutdown(&self) {
        for handle in &self.worker_handles {
            handle.abort();
        }
    }
}
