use pulsegate_core::PatternValidationError;
use pulsegate_mapping::MappingAdmissionError;

use crate::normalize::NormalizeError;

/// Errors the Event Router surfaces to its caller: the ingress adapter (on
/// `on_event`) or an admin surface (on admission). Per-item dispatch outcomes
/// never reach this enum — those are recorded through the queue's outcome
/// sink and metrics (spec.md §7: "the core never crashes on a per-item
/// error; only violated admission invariants are raised to callers").
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouterError {
    #[error("ingress payload could not be normalized: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("mapping rejected at admission: {0}")]
    MappingAdmission(#[from] MappingAdmissionError),
    #[error("pattern rejected at admission: {0}")]
    PatternAdmission(#[from] PatternValidationError),
}
