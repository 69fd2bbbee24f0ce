use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::warn;

/// Maximum source pattern length (§4.1).
pub const MAX_PATTERN_LEN: usize = 200;
/// Maximum number of quantifier characters (`*`, `+`, `?`) allowed in a
/// pattern source (§4.1).
pub const MAX_QUANTIFIER_CHARS: usize = 15;
/// Minimum alternative count that counts as "wide alternation" (§4.1).
const WIDE_ALTERNATION_MIN_ALTERNATIVES: usize = 5;
/// `{n,m}` is rejected once `m` reaches this many digits (§4.1).
const MAX_BOUND_DIGITS: usize = 6;
/// Input is truncated before matching (§4.1, §5).
pub const MAX_INPUT_LEN: usize = 10_000;
/// Matches slower than this are logged as suspicious (§4.1).
const SLOW_MATCH_THRESHOLD: Duration = Duration::from_millis(50);

/// Why a candidate `messagePattern` was rejected before it was ever compiled.
/// These are the ReDoS-hardening rules of §4.1, applied to the *source*
/// pattern, never the compiled automaton.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegexGuardError {
    #[error("pattern length {0} exceeds the {MAX_PATTERN_LEN} char limit")]
    TooLong(usize),
    #[error("pattern contains a nested quantifier (e.g. `(a+)+`)")]
    NestedQuantifier,
    #[error("pattern combines wide alternation with an outer quantifier")]
    WideAlternationWithQuantifier,
    #[error("pattern contains a bounded repetition with an oversized upper bound")]
    OversizedBound,
    #[error("pattern contains more than {MAX_QUANTIFIER_CHARS} quantifier characters")]
    TooManyQuantifiers,
    #[error("pattern failed to compile: {0}")]
    CompileFailed(String),
}

/// Reject patterns matching any of the five admission heuristics of §4.1
/// before a single byte of it is handed to the regex compiler.
pub fn validate_source(pattern: &str) -> Result<(), RegexGuardError> {
    if pattern.len() > MAX_PATTERN_LEN {
        return Err(RegexGuardError::TooLong(pattern.len()));
    }
    if has_nested_quantifier(pattern) {
        return Err(RegexGuardError::NestedQuantifier);
    }
    if has_wide_alternation_with_quantifier(pattern) {
        return Err(RegexGuardError::WideAlternationWithQuantifier);
    }
    if has_oversized_bound(pattern) {
        return Err(RegexGuardError::OversizedBound);
    }
    let quantifier_count = pattern.chars().filter(|c| matches!(c, '*' | '+' | '?')).count();
    if quantifier_count > MAX_QUANTIFIER_CHARS {
        return Err(RegexGuardError::TooManyQuantifiers);
    }
    Ok(())
}

/// Validate the source, then compile as case-insensitive, multi-line. This
/// is the only place a mapping's `messagePattern` is compiled — the result
/// is cached on the admitted mapping, never recompiled per evaluation (§9).
pub fn compile(pattern: &str) -> Result<Regex, RegexGuardError> {
    validate_source(pattern)?;
    Regex::new(&format!("(?im){pattern}")).map_err(|e| RegexGuardError::CompileFailed(e.to_string()))
}

/// Match `input` against an already-admitted, already-compiled regex, truncating
/// to [`MAX_INPUT_LEN`] chars and logging (but not aborting) if the match is
/// unexpectedly slow. This is a *soft* deadline: the underlying regex engine
/// cannot be preempted mid-match, so the real guarantee against runaway
/// matches comes from the admission-time structural checks above; this is a
/// diagnostic backstop, not the primary defense.
pub fn is_match_guarded(re: &Regex, input: &str) -> bool {
    let truncated: String = input.chars().take(MAX_INPUT_LEN).collect();
    let start = Instant::now();
    let matched = re.is_match(&truncated);
    let elapsed = start.elapsed();
    if elapsed > SLOW_MATCH_THRESHOLD {
        warn!(?elapsed, pattern = re.as_str(), "mapping: regex match slower than expected");
    }
    matched
}

fn has_nested_quantifier(pattern: &str) -> bool {
    // Detects `(...X)[*+]` where X, the character immediately before the
    // closing paren, is itself a quantifier — the canonical `(a+)+` shape.
    let bytes = pattern.as_bytes();
    let mut depth_stack: Vec<usize> = Vec::new();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' => depth_stack.push(i),
            b')' => {
                if depth_stack.pop().is_some() && i > 0 {
                    let inner_last = bytes[i - 1];
                    let outer_quantifier = bytes.get(i + 1).copied();
                    if matches!(inner_last, b'*' | b'+') && matches!(outer_quantifier, Some(b'*' | b'+')) {
                        return true;
                    }
                }
            }
            _ => {}
        }
    }
    false
}

fn has_wide_alternation_with_quantifier(pattern: &str) -> bool {
    let bytes = pattern.as_bytes();
    let mut depth_stack: Vec<(usize, usize)> = Vec::new(); // (start_index, pipe_count)
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' => depth_stack.push((i, 0)),
            b'|' => {
                if let Some(last) = depth_stack.last_mut() {
                    last.1 += 1;
                }
            }
            b')' => {
                if let Some((_, pipe_count)) = depth_stack.pop() {
                    let alternatives = pipe_count + 1;
                    let outer_quantifier = bytes.get(i + 1).copied();
                    if alternatives >= WIDE_ALTERNATION_MIN_ALTERNATIVES
                        && matches!(outer_quantifier, Some(b'*' | b'+'))
                    {
                        return true;
                    }
                }
            }
            _ => {}
        }
    }
    false
}

fn bound_regex() -> &'static Regex {
    static BOUND_RE: OnceLock<Regex> = OnceLock::new();
    BOUND_RE.get_or_init(|| Regex::new(r"\{\d*,(\d+)\}").expect("static bound regex is valid"))
}

fn has_oversized_bound(pattern: &str) -> bool {
    bound_regex()
        .captures_iter(pattern)
        .any(|caps| caps.get(1).is_some_and(|m| m.as_str().len() >= MAX_BOUND_DIGITS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nested_quantifier() {
        assert_eq!(validate_source("(a+)+$"), Err(RegexGuardError::NestedQuantifier));
    }

    #[test]
    fn accepts_simple_anchor_pattern() {
        assert!(validate_source("^!hello").is_ok());
    }

    #[test]
    fn rejects_too_long_pattern() {
        let long = "a".repeat(MAX_PATTERN_LEN + 1);
        assert_eq!(validate_source(&long), Err(RegexGuardError::TooLong(long.len())));
    }

    #[test]
    fn rejects_wide_alternation_with_outer_quantifier() {
        assert_eq!(
            validate_source("(a|b|c|d|e)+"),
            Err(RegexGuardError::WideAlternationWithQuantifier)
        );
    }

    #[test]
    fn allows_narrow_alternation_with_quantifier() {
        assert!(validate_source("(a|b)+").is_ok());
    }

    #[test]
    fn rejects_oversized_bound() {
        assert_eq!(validate_source("a{1,123456}"), Err(RegexGuardError::OversizedBound));
    }

    #[test]
    fn allows_small_bound() {
        assert!(validate_source("a{1,10}").is_ok());
    }

    #[test]
    fn rejects_excess_quantifier_chars() {
        let pattern = "a?".repeat(20);
        assert_eq!(validate_source(&pattern), Err(RegexGuardError::TooManyQuantifiers));
    }

    #[test]
    fn compile_then_match_works_for_safe_pattern() {
        let re = compile("^!hello").unwrap();
        assert!(is_match_guarded(&re, "!hello world"));
        assert!(!is_match_guarded(&re, "hi"));
    }

    #[test]
    fn compile_rejects_unsafe_pattern_before_touching_regex_crate() {
        assert!(matches!(compile("(a+)+$"), Err(RegexGuardError::NestedQuantifier)));
    }

    #[test]
    fn match_is_case_insensitive_and_multiline() {
        let re = compile("^hello$").unwrap();
        assert!(is_match_guarded(&re, "line one\nHELLO\nline three"));
    }
}
