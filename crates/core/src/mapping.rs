use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::event::EventKind;
use crate::ids::{DeviceId, MappingId, PatternId};

/// Kind of atomic device command a mapping or pattern step can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Shock,
    Vibrate,
    Sound,
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Shock => "shock",
            Self::Vibrate => "vibrate",
            Self::Sound => "sound",
        };
        f.write_str(s)
    }
}

/// Minimum and maximum allowed intensity/duration, per spec.md §3.
pub const MIN_INTENSITY: u8 = 1;
pub const MAX_INTENSITY: u8 = 100;
pub const MIN_DURATION_MS: u32 = 300;
pub const MAX_DURATION_MS: u32 = 30_000;
pub const MIN_PRIORITY: u8 = 0;
pub const MAX_PRIORITY: u8 = 10;

/// Conditions that narrow when a mapping matches an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    /// Case-insensitive exact match against `EventPayload::Gift::gift_name`.
    #[serde(default)]
    pub gift_name: Option<String>,
    #[serde(default)]
    pub min_coins: Option<u64>,
    #[serde(default)]
    pub max_coins: Option<u64>,
    /// Source regex pattern (ReDoS-hardened and compiled at admission by
    /// `pulsegate-mapping`, not here — this crate only carries the source).
    #[serde(default)]
    pub message_pattern: Option<String>,
    #[serde(default)]
    pub min_likes: Option<u64>,
    #[serde(default)]
    pub team_level_min: Option<i64>,
    #[serde(default)]
    pub follower_age_min_days: Option<i64>,
    #[serde(default)]
    pub whitelist: HashSet<String>,
    #[serde(default)]
    pub blacklist: HashSet<String>,
}

/// Per-mapping caps that further narrow the global safety configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSafetyCaps {
    #[serde(default)]
    pub max_intensity: Option<u8>,
    #[serde(default)]
    pub max_duration_ms: Option<u32>,
}

/// Three-tier cooldown configuration, all in milliseconds. `0` means "no
/// cooldown at this tier".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownConfig {
    #[serde(default)]
    pub global_ms: u64,
    #[serde(default)]
    pub per_device_ms: u64,
    #[serde(default)]
    pub per_user_ms: u64,
}

/// The action a mapping emits when its conditions match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MappingAction {
    Command {
        device_id: DeviceId,
        command_kind: CommandKind,
        intensity: u8,
        duration_ms: u32,
        priority: u8,
    },
    Pattern {
        device_id: DeviceId,
        pattern_id: PatternId,
        priority: u8,
    },
}

impl MappingAction {
    /// Priority used for inter-execution arbitration (§4.1 step 7).
    #[must_use]
    pub fn priority(&self) -> u8 {
        match self {
            Self::Command { priority, .. } | Self::Pattern { priority, .. } => *priority,
        }
    }

    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        match self {
            Self::Command { device_id, .. } | Self::Pattern { device_id, .. } => device_id,
        }
    }
}

/// A user-defined rule binding a condition predicate to an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub id: MappingId,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub event_kind: EventKind,
    #[serde(default)]
    pub conditions: Conditions,
    pub action: MappingAction,
    #[serde(default)]
    pub cooldown: CooldownConfig,
    #[serde(default)]
    pub safety: Option<MappingSafetyCaps>,
}

fn default_true() -> bool {
    true
}

/// Reasons a mapping fails structural admission validation (§3 invariants).
/// Does *not* include regex safety — that is layered on by
/// `pulsegate-mapping`, which owns the `regex` dependency.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingValidationError {
    #[error("mapping id must not be empty")]
    EmptyId,
    #[error("mapping name must not be empty")]
    EmptyName,
    #[error("command intensity {0} out of range [{MIN_INTENSITY}, {MAX_INTENSITY}]")]
    IntensityOutOfRange(u8),
    #[error("command duration {0}ms out of range [{MIN_DURATION_MS}, {MAX_DURATION_MS}]")]
    DurationOutOfRange(u32),
    #[error("action priority {0} out of range [{MIN_PRIORITY}, {MAX_PRIORITY}]")]
    PriorityOutOfRange(u8),
    #[error("pattern id must not be empty")]
    EmptyPatternId,
}

impl Mapping {
    /// Structural validation shared by every admission path (§3: "every
    /// mapping passes validate() before admission"). Regex safety is a
    /// separate, additional admission gate layered on top by the mapping
    /// engine.
    pub fn validate(&self) -> Result<(), MappingValidationError> {
        if self.id.as_str().is_empty() {
            return Err(MappingValidationError::EmptyId);
        }
        if self.name.is_empty() {
            return Err(MappingValidationError::EmptyName);
        }
        match &self.action {
            MappingAction::Command {
                intensity,
                duration_ms,
                priority,
                ..
            } => {
                if !(MIN_INTENSITY..=MAX_INTENSITY).contains(intensity) {
                    return Err(MappingValidationError::IntensityOutOfRange(*intensity));
                }
                if !(MIN_DURATION_MS..=MAX_DURATION_MS).contains(duration_ms) {
                    return Err(MappingValidationError::DurationOutOfRange(*duration_ms));
                }
                if !(MIN_PRIORITY..=MAX_PRIORITY).contains(priority) {
                    return Err(MappingValidationError::PriorityOutOfRange(*priority));
                }
            }
            MappingAction::Pattern {
                pattern_id,
                priority,
                ..
            } => {
                if pattern_id.as_str().is_empty() {
                    return Err(MappingValidationError::EmptyPatternId);
                }
                if !(MIN_PRIORITY..=MAX_PRIORITY).contains(priority) {
                    return Err(MappingValidationError::PriorityOutOfRange(*priority));
                }
            }
        }
        Ok(())
    }

    /// Whether this mapping has a concrete (non-empty, non-wildcard) gift
    /// name condition, used by the gift-specificity rule (§4.1 step 6).
    #[must_use]
    pub fn has_concrete_gift_name(&self) -> bool {
        match self.conditions.gift_name.as_deref() {
            Some(name) => !name.is_empty() && name != "*",
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command_mapping(intensity: u8, duration_ms: u32, priority: u8) -> Mapping {
        Mapping {
            id: MappingId::new("m1"),
            name: "rose".into(),
            enabled: true,
            event_kind: EventKind::Gift,
            conditions: Conditions::default(),
            action: MappingAction::Command {
                device_id: DeviceId::new("d1"),
                command_kind: CommandKind::Vibrate,
                intensity,
                duration_ms,
                priority,
            },
            cooldown: CooldownConfig::default(),
            safety: None,
        }
    }

    #[test]
    fn valid_command_mapping_passes() {
        assert!(command_mapping(50, 1000, 5).validate().is_ok());
    }

    #[test]
    fn intensity_out_of_range_rejected() {
        assert_eq!(
            command_mapping(0, 1000, 5).validate(),
            Err(MappingValidationError::IntensityOutOfRange(0))
        );
        assert_eq!(
            command_mapping(101, 1000, 5).validate(),
            Err(MappingValidationError::IntensityOutOfRange(101))
        );
    }

    #[test]
    fn duration_out_of_range_rejected() {
        assert_eq!(
            command_mapping(50, 100, 5).validate(),
            Err(MappingValidationError::DurationOutOfRange(100))
        );
        assert_eq!(
            command_mapping(50, 40_000, 5).validate(),
            Err(MappingValidationError::DurationOutOfRange(40_000))
        );
    }

    #[test]
    fn priority_out_of_range_rejected() {
        assert_eq!(
            command_mapping(50, 1000, 11).validate(),
            Err(MappingValidationError::PriorityOutOfRange(11))
        );
    }

    #[test]
    fn empty_id_rejected() {
        let mut m = command_mapping(50, 1000, 5);
        m.id = MappingId::new("");
        assert_eq!(m.validate(), Err(MappingValidationError::EmptyId));
    }

    #[test]
    fn pattern_mapping_requires_pattern_id() {
        let mut m = command_mapping(50, 1000, 5);
        m.action = MappingAction::Pattern {
            device_id: DeviceId::new("d1"),
            pattern_id: PatternId::new(""),
            priority: 5,
        };
        assert_eq!(m.validate(), Err(MappingValidationError::EmptyPatternId));
    }

    #[test]
    fn concrete_gift_name_detection() {
        let mut m = command_mapping(50, 1000, 5);
        assert!(!m.has_concrete_gift_name());
        m.conditions.gift_name = Some(String::new());
        assert!(!m.has_concrete_gift_name());
        m.conditions.gift_name = Some("*".into());
        assert!(!m.has_concrete_gift_name());
        m.conditions.gift_name = Some("Rose".into());
        assert!(m.has_concrete_gift_name());
    }

    #[test]
    fn mapping_serde_roundtrip() {
        let m = command_mapping(50, 1000, 5);
        let json = serde_json::to_string(&m).unwrap();
        let back: Mapping = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
