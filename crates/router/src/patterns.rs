use dashmap::DashMap;
use pulsegate_core::{Pattern, PatternId, PatternValidationError};

/// Admitted pattern definitions, keyed by id. Owned by the Event Router —
/// distinct from [`pulsegate_pattern::PatternEngine`], which tracks *live
/// executions* of a pattern, not the pattern definitions themselves (spec.md
/// §3: "Pattern" vs "Pattern Execution" are different records with different
/// owners).
#[derive(Debug, Default)]
pub struct PatternRegistry {
    patterns: DashMap<PatternId, Pattern>,
}

impl PatternRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a pattern: structural validation (§4.2), then insert. Replaces
    /// any existing pattern with the same id.
    pub fn admit(&self, pattern: Pattern) -> Result<(), PatternValidationError> {
        pattern.validate()?;
        self.patterns.insert(pattern.id.clone(), pattern);
        Ok(())
    }

    pub fn remove(&self, id: &PatternId) {
        self.patterns.remove(id);
    }

    #[must_use]
    pub fn get(&self, id: &PatternId) -> Option<Pattern> {
        self.patterns.get(id).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
