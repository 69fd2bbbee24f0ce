use pulsegate_core::{Mapping, MappingValidationError};
use regex::Regex;

use crate::regex_guard::{self, RegexGuardError};

/// Errors that can prevent a mapping from being admitted to the engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MappingAdmissionError {
    #[error("invalid_mapping: {0}")]
    Structural(#[from] MappingValidationError),
    #[error("invalid_mapping: regex_unsafe: {0}")]
    RegexUnsafe(#[from] RegexGuardError),
}

/// An admitted mapping with its `messagePattern`, if any, compiled exactly
/// once (§9: "compile once at admission, cache the compiled regex on the
/// mapping"). Structural validation and regex hardening both happen here,
/// before the mapping is ever exposed to evaluation.
#[derive(Debug, Clone)]
pub struct CompiledMapping {
    pub mapping: Mapping,
    pub message_pattern: Option<Regex>,
}

impl CompiledMapping {
    /// Admit `mapping`: run structural validation, then — if present —
    /// validate and compile `conditions.message_pattern`. The safety
    /// whitelist of hardening rules (§4.1) is applied to the source
    /// pattern, never to the compiled automaton.
    pub fn admit(mapping: Mapping) -> Result<Self, MappingAdmissionError> {
        mapping.validate()?;
        let message_pattern = match mapping.conditions.message_pattern.as_deref() {
            Some(source) => Some(regex_guard::compile(source)?),
            None => None,
        };
        Ok(Self {
            mapping,
            message_pattern,
        })
    }
}
