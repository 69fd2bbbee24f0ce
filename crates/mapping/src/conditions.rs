use pulsegate_core::{Conditions, Event};
use regex::Regex;
use tracing::debug;

use crate::regex_guard::is_match_guarded;

/// Evaluate a mapping's [`Conditions`] against an event (§4.1 "Condition
/// evaluation details"). `compiled_message_pattern` is the already-admitted,
/// already-compiled regex for `conditions.message_pattern`, if any — this
/// function never compiles a pattern itself.
#[must_use]
pub fn matches(conditions: &Conditions, compiled_message_pattern: Option<&Regex>, event: &Event) -> bool {
    if let Some(wanted) = &conditions.gift_name {
        match event.payload.gift_name() {
            Some(actual) if actual.eq_ignore_ascii_case(wanted) => {}
            _ => return false,
        }
    }

    if let Some(min_coins) = conditions.min_coins {
        match event.payload.coins() {
            Some(coins) if coins >= min_coins => {}
            _ => return false,
        }
    }

    if let Some(max_coins) = conditions.max_coins {
        match event.payload.coins() {
            Some(coins) if coins <= max_coins => {}
            _ => return false,
        }
    }

    if let Some(re) = compiled_message_pattern {
        match event.payload.message() {
            Some(text) => {
                if !is_match_guarded(re, text) {
                    return false;
                }
            }
            None => return false,
        }
    }

    if let Some(min_likes) = conditions.min_likes {
        match event.payload.like_count() {
            Some(count) if count >= min_likes => {}
            _ => return false,
        }
    }

    if let Some(team_level_min) = conditions.team_level_min {
        match event.user.team_level {
            Some(level) if level >= team_level_min => {}
            _ => return false,
        }
    }

    if let Some(min_days) = conditions.follower_age_min_days {
        match event.user.follower_age_days(event.received_at) {
            Some(days) if days >= min_days => {}
            _ => return false,
        }
    }

    if !conditions.whitelist.is_empty()
        && !conditions.whitelist.iter().any(|id| event.user.matches_identifier(id))
    {
        debug!(user = %event.user.id, "mapping: condition failed, user not on whitelist");
        return false;
    }

    if conditions.blacklist.iter().any(|id| event.user.matches_identifier(id)) {
        debug!(user = %event.user.id, "mapping: condition failed, user on blacklist");
        return false;
    }

    true
}
