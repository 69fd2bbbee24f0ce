use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pulsegate_core::{CommandKind, DeviceId, Event, MappingAction, MappingId, PatternId};
use tracing::{debug, trace};

use crate::compiled::{CompiledMapping, MappingAdmissionError};
use crate::conditions;
use crate::cooldown::CooldownLedger;

/// Read-only view of the global safety caps the Mapping Engine needs to
/// apply its own clamp (§4.1 step 4). The full rate-limiting/emergency-stop
/// machinery lives in `pulsegate-safety` and is consulted again, independently,
/// by the dispatcher — this is intentionally the minimal slice M needs.
#[derive(Debug, Clone, Copy)]
pub struct GlobalSafetyCaps {
    pub max_intensity: u8,
    pub max_duration_ms: u32,
}

/// One action a matched mapping wants executed (§4.1 contract: "evaluate(event)
/// -> ordered list of (mapping, actionToExecute)").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedAction {
    pub mapping_id: MappingId,
    pub device_id: DeviceId,
    pub priority: u8,
    pub kind: MatchedActionKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchedActionKind {
    Command {
        command_kind: CommandKind,
        intensity: u8,
        duration_ms: u32,
    },
    Pattern {
        pattern_id: PatternId,
    },
}

/// Holds the admitted mapping set and the cooldown ledger. Mappings are
/// stored in a `DashMap` so reads (the hot path, `evaluate`) never block on
/// admin-surface writes for long (§5: "M reads the mapping set under a
/// shared lock").
#[derive(Debug, Default)]
pub struct MappingEngine {
    mappings: DashMap<MappingId, CompiledMapping>,
    cooldowns: CooldownLedger,
}

impl MappingEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a mapping: structural + regex-safety validation, then insert.
    /// Replaces any existing mapping with the same id.
    pub fn admit(&self, mapping: pulsegate_core::Mapping) -> Result<(), MappingAdmissionError> {
        let compiled = CompiledMapping::admit(mapping)?;
        self.mappings.insert(compiled.mapping.id.clone(), compiled);
        Ok(())
    }

    pub fn remove(&self, id: &MappingId) {
        self.mappings.remove(id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Evaluate `event` against the admitted mapping set (§4.1).
    pub fn evaluate(&self, event: &Event, global_caps: GlobalSafetyCaps, now: DateTime<Utc>) -> Vec<MatchedAction> {
        self.cooldowns.gc(now);

        let mut survivors: Vec<(CompiledMapping, MatchedActionKind)> = Vec::new();

        for entry in &self.mappings {
            let compiled = entry.value();
            let mapping = &compiled.mapping;

            if !mapping.enabled || mapping.event_kind != event.kind {
                continue;
            }

            if !conditions::matches(&mapping.conditions, compiled.message_pattern.as_ref(), event) {
                trace!(mapping = %mapping.id, "mapping: conditions did not match");
                continue;
            }

            let device_id = mapping.action.device_id().clone();
            let user_id = event.user.id.clone();
            if self
                .cooldowns
                .is_active(&mapping.id, &device_id, &user_id, &mapping.cooldown, now)
            {
                debug!(mapping = %mapping.id, "mapping: skipped, cooldown active");
                continue;
            }

            let kind = match &mapping.action {
                MappingAction::Command {
                    command_kind,
                    intensity,
                    duration_ms,
                    ..
                } => {
                    let intensity_cap = mapping
                        .safety
                        .and_then(|s| s.max_intensity)
                        .map_or(global_caps.max_intensity, |m| m.min(global_caps.max_intensity));
                    let duration_cap = mapping
                        .safety
                        .and_then(|s| s.max_duration_ms)
                        .map_or(global_caps.max_duration_ms, |m| m.min(global_caps.max_duration_ms));
                    MatchedActionKind::Command {
                        command_kind: *command_kind,
                        intensity: (*intensity).min(intensity_cap),
                        duration_ms: (*duration_ms).min(duration_cap),
                    }
                }
                MappingAction::Pattern { pattern_id, .. } => MatchedActionKind::Pattern {
                    pattern_id: pattern_id.clone(),
                },
            };

            // Register cooldowns at match time (§4.1 step 5), before the
            // gift-specificity filter — a mapping that matched consumes its
            // cooldown even if specificity later discards it from the
            // returned set.
            self.cooldowns.register(&mapping.id, &device_id, &user_id, now);

            survivors.push((compiled.clone(), kind));
        }

        let has_concrete_gift_match = event.kind == pulsegate_core::EventKind::Gift
            && survivors.iter().any(|(c, _)| c.mapping.has_concrete_gift_name());

        let mut results: Vec<MatchedAction> = survivors
            .into_iter()
            .filter(|(compiled, _)| {
                !has_concrete_gift_match || compiled.mapping.has_concrete_gift_name()
            })
            .map(|(compiled, kind)| MatchedAction {
                mapping_id: compiled.mapping.id.clone(),
                device_id: compiled.mapping.action.device_id().clone(),
                priority: compiled.mapping.action.priority(),
                kind,
            })
            .collect();

        results.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.mapping_id.cmp(&b.mapping_id))
        });

        results
    }
}
