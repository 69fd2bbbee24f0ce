use serde::{Deserialize, Serialize};

use crate::ids::PatternId;
use crate::mapping::{CommandKind, MAX_DURATION_MS, MAX_INTENSITY, MIN_DURATION_MS, MIN_INTENSITY};

/// A single step of a named pattern (§3): either a pause that only advances
/// the cumulative schedule, or a command with an optional extra per-step
/// delay layered on top of that schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternStep {
    Pause {
        duration_ms: u32,
    },
    Command {
        command_kind: CommandKind,
        intensity: u8,
        duration_ms: u32,
        /// Extra delay added on top of the cumulative schedule (§4.2).
        #[serde(default)]
        delay_ms: u32,
    },
}

impl PatternStep {
    #[must_use]
    pub fn is_command(&self) -> bool {
        matches!(self, Self::Command { .. })
    }
}

/// A named, ordered sequence of pause/command steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<PatternStep>,
}

/// Reasons a pattern fails structural admission validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternValidationError {
    #[error("pattern id must not be empty")]
    EmptyId,
    #[error(
        "pattern {pattern} step {index}: intensity {value} out of range [{MIN_INTENSITY}, {MAX_INTENSITY}]"
    )]
    IntensityOutOfRange {
        pattern: PatternId,
        index: usize,
        value: u8,
    },
    #[error(
        "pattern {pattern} step {index}: duration {value}ms out of range [{MIN_DURATION_MS}, {MAX_DURATION_MS}]"
    )]
    DurationOutOfRange {
        pattern: PatternId,
        index: usize,
        value: u32,
    },
}

impl Pattern {
    /// Structural validation performed once at admission, mirroring
    /// `Mapping::validate` (§4.2: patterns are validated the same way
    /// mappings are, before being made available to the mapping engine). An
    /// empty pattern is *not* a validation error — §4.2 defines `expand` on
    /// an empty pattern as a legal no-op that enqueues nothing.
    pub fn validate(&self) -> Result<(), PatternValidationError> {
        if self.id.as_str().is_empty() {
            return Err(PatternValidationError::EmptyId);
        }
        for (index, step) in self.steps.iter().enumerate() {
            if let PatternStep::Command {
                intensity, duration_ms, ..
            } = step
            {
                if !(MIN_INTENSITY..=MAX_INTENSITY).contains(intensity) {
                    return Err(PatternValidationError::IntensityOutOfRange {
                        pattern: self.id.clone(),
                        index,
                        value: *intensity,
                    });
                }
                if !(MIN_DURATION_MS..=MAX_DURATION_MS).contains(duration_ms) {
                    return Err(PatternValidationError::DurationOutOfRange {
                        pattern: self.id.clone(),
                        index,
                        value: *duration_ms,
                    });
                }
            }
        }
        Ok(())
    }

    /// Number of command steps this pattern will expand into queue items.
    #[must_use]
    pub fn command_step_count(&self) -> usize {
        self.steps.iter().filter(|s| s.is_command()).count()
    }
}
