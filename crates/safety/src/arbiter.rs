use chrono::{DateTime, Utc};
use pulsegate_core::{DropReason, MappingSafetyCaps, UserId};
use tracing::{debug, warn};

use crate::config::SafetyConfig;
use crate::latch::EmergencyLatch;
use crate::ledger::RateLedger;

/// A proposed command as seen by the Safety Arbiter: just the fields it
/// needs to validate, independent of where the command originated.
#[derive(Debug, Clone, Copy)]
pub struct ProposedCommand {
    pub intensity: u8,
    pub duration_ms: u32,
}

/// Result of [`SafetyArbiter::validate`] (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow {
        adjusted_intensity: u8,
        adjusted_duration_ms: u32,
    },
    Deny(DropReason),
}

/// Pure validator over a [`SafetyConfig`], the rate ledger, and the
/// emergency-stop latch (§4.4). Holds no I/O; every method is synchronous.
#[derive(Debug, Clone)]
pub struct SafetyArbiter {
    config: SafetyConfig,
    ledger: std::sync::Arc<RateLedger>,
    latch: EmergencyLatch,
}

impl SafetyArbiter {
    #[must_use]
    pub fn new(config: SafetyConfig) -> Self {
        Self {
            config,
            ledger: std::sync::Arc::new(RateLedger::new()),
            latch: EmergencyLatch::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    /// A cloneable handle to the emergency-stop latch, for the dispatcher
    /// and an admin surface to observe and toggle.
    #[must_use]
    pub fn latch(&self) -> EmergencyLatch {
        self.latch.clone()
    }

    /// Record a successful dispatch against the rate ledger. Callers must
    /// invoke this only after a dispatch actually succeeds (§4.4: "ledger
    /// updates happen after successful dispatch, not on validation").
    pub fn record_dispatch(&self, user: &UserId, at: DateTime<Utc>) {
        self.ledger.record(user, at);
    }

    /// Validate a proposed command against global caps, the rate ledger, and
    /// the emergency-stop latch.
    pub fn validate(
        &self,
        cmd: ProposedCommand,
        mapping_caps: Option<MappingSafetyCaps>,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Decision {
        if self.config.emergency_stop_enabled && self.latch.is_engaged() {
            debug!(user = %user, "safety: denied, emergency stop engaged");
            return Decision::Deny(DropReason::EmergencyStop);
        }

        let global_count = self.ledger.global_count(now);
        if global_count >= self.config.max_commands_per_minute {
            warn!(count = global_count, "safety: denied, global rate exceeded");
            return Decision::Deny(DropReason::SafetyGlobalRate);
        }

        if let Some(max_per_user) = self.config.user_limits.max_commands_per_user {
            let user_count = self.ledger.user_count(user, now);
            if user_count >= max_per_user {
                warn!(user = %user, count = user_count, "safety: denied, per-user rate exceeded");
                return Decision::Deny(DropReason::SafetyUserRate);
            }
        }

        let intensity_cap = mapping_caps
            .and_then(|c| c.max_intensity)
            .map_or(self.config.max_intensity, |m| m.min(self.config.max_intensity));
        let duration_cap = mapping_caps
            .and_then(|c| c.max_duration_ms)
            .map_or(self.config.max_duration_ms, |m| m.min(self.config.max_duration_ms));

        let adjusted_intensity = cmd.intensity.clamp(
            pulsegate_core::MIN_INTENSITY,
            intensity_cap.max(pulsegate_core::MIN_INTENSITY),
        );
        let adjusted_duration_ms = cmd.duration_ms.clamp(
            pulsegate_core::MIN_DURATION_MS,
            duration_cap.max(pulsegate_core::MIN_DURATION_MS),
        );

        Decision::Allow {
            adjusted_intensity,
            adjusted_duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arbiter() -> SafetyArbiter {
        SafetyArbiter::new(SafetyConfig {
            max_intensity: 80,
            max_duration_ms: 5000,
            max_commands_per_minute: 3,
            ..SafetyConfig::default()
        })
    }

    #[test]
    fn allows_within_caps_unchanged() {
        let arb = arbiter();
        let now = Utc::now();
        let decision = arb.validate(
            ProposedCommand {
                intensity: 50,
                duration_ms: 1000,
            },
            None,
            &UserId::new("u1"),
            now,
        );
        assert_eq!(
            decision,
            Decision::Allow {
                adjusted_intensity: 50,
                adjusted_duration_ms: 1000,
            }
        );
    }

    #[test]
    fn clamps_intensity_and_duration_to_global_cap() {
        let arb = arbiter();
        let now = Utc::now();
        let decision = arb.validate(
            ProposedCommand {
                intensity: 100,
                duration_ms: 10_000,
            },
            None,
            &UserId::new("u1"),
            now,
        );
        assert_eq!(
            decision,
            Decision::Allow {
                adjusted_intensity: 80,
                adjusted_duration_ms: 5000,
            }
        );
    }

    #[test]
    fn mapping_local_cap_narrows_further() {
        let arb = arbiter();
        let now = Utc::now();
        let caps = MappingSafetyCaps {
            max_intensity: Some(40),
            max_duration_ms: None,
        };
        let decision = arb.validate(
            ProposedCommand {
                intensity: 100,
                duration_ms: 1000,
            },
            Some(caps),
            &UserId::new("u1"),
            now,
        );
        assert_eq!(
            decision,
            Decision::Allow {
                adjusted_intensity: 40,
                adjusted_duration_ms: 1000,
            }
        );
    }

    #[test]
    fn denies_when_emergency_stop_engaged() {
        let arb = arbiter();
        arb.latch().trigger();
        let decision = arb.validate(
            ProposedCommand {
                intensity: 50,
                duration_ms: 1000,
            },
            None,
            &UserId::new("u1"),
            Utc::now(),
        );
        assert_eq!(decision, Decision::Deny(DropReason::EmergencyStop));
    }

    #[test]
    fn denies_over_global_rate_cap() {
        let arb = arbiter();
        let now = Utc::now();
        let user = UserId::new("u1");
        for _ in 0..3 {
            arb.record_dispatch(&user, now);
        }
        let decision = arb.validate(
            ProposedCommand {
                intensity: 50,
                duration_ms: 1000,
            },
            None,
            &user,
            now,
        );
        assert_eq!(decision, Decision::Deny(DropReason::SafetyGlobalRate));
    }

    #[test]
    fn denied_validation_does_not_consume_rate_budget() {
        let arb = arbiter();
        arb.latch().trigger();
        let now = Utc::now();
        let user = UserId::new("u1");
        let _ = arb.validate(
            ProposedCommand {
                intensity: 50,
                duration_ms: 1000,
            },
            None,
            &user,
            now,
        );
        assert_eq!(arb.ledger.global_count(now), 0);
    }

    #[test]
    fn per_user_rate_cap_denies_independently_of_global() {
        let arb = SafetyArbiter::new(SafetyConfig {
            max_commands_per_minute: 100,
            user_limits: crate::config::UserLimits {
                max_commands_per_user: Some(1),
                ..Default::default()
            },
            ..SafetyConfig::default()
        });
        let now = Utc::now();
        let user = UserId::new("u1");
        arb.record_dispatch(&user, now);
        let decision = arb.validate(
            ProposedCommand {
                intensity: 50,
                duration_ms: 1000,
            },
            None,
            &user,
            now,
        );
        assert_eq!(decision, Decision::Deny(DropReason::SafetyUserRate));
    }
}
