//! Mapping Engine (§4.1): admission (structural validation + ReDoS-hardened
//! regex compilation), condition evaluation, the cooldown ledger, and the
//! gift-specificity and priority-arbitration rules.

mod compiled;
mod conditions;
mod cooldown;
mod engine;
mod regex_guard;

pub use compiled::{CompiledMapping, MappingAdmissionError};
pub use cooldown::CooldownLedger;
pub use engine::{GlobalSafetyCaps, MappingEngine, MatchedAction, MatchedActionKind};
pub use regex_guard::{compile as compile_message_pattern, validate_source as validate_message_pattern, RegexGuardError};
