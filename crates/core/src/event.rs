use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// The kind of occurrence reported by the streaming ingress adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Chat,
    Gift,
    Follow,
    Share,
    Subscribe,
    Like,
    GoalProgress,
    GoalComplete,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Chat => "chat",
            Self::Gift => "gift",
            Self::Follow => "follow",
            Self::Share => "share",
            Self::Subscribe => "subscribe",
            Self::Like => "like",
            Self::GoalProgress => "goal-progress",
            Self::GoalComplete => "goal-complete",
        };
        f.write_str(s)
    }
}

/// Normalized user identity. Dual-schema tolerance (`userId`/`uniqueId`,
/// `userName`/`username`, `teamLevel`/`teamMemberLevel`) is resolved once at
/// the Event Router boundary (see `pulsegate_router::normalize`); by the time
/// an `Event` exists, the schema ambiguity is already gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventUser {
    pub id: UserId,
    pub display_name: String,
    /// Team / fan-club level, if the ingress adapter reported one.
    #[serde(default)]
    pub team_level: Option<i64>,
    /// When this user started following, if known. Used by
    /// `followerAgeMinDays` conditions.
    #[serde(default)]
    pub follow_since: Option<DateTime<Utc>>,
}

impl EventUser {
    #[must_use]
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            team_level: None,
            follow_since: None,
        }
    }

    #[must_use]
    pub fn with_team_level(mut self, level: i64) -> Self {
        self.team_level = Some(level);
        self
    }

    #[must_use]
    pub fn with_follow_since(mut self, since: DateTime<Utc>) -> Self {
        self.follow_since = Some(since);
        self
    }

    /// Returns true if this user matches the given identifier by id or
    /// display name (case-sensitive, per §4.1: whitelist/blacklist match "id
    /// *or* display name").
    #[must_use]
    pub fn matches_identifier(&self, needle: &str) -> bool {
        self.id.as_str() == needle || self.display_name == needle
    }

    /// Age of the follow relationship in whole days, if known.
    #[must_use]
    pub fn follower_age_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.follow_since.map(|since| (now - since).num_days())
    }
}

/// Kind-specific event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Chat { text: String },
    Gift { gift_name: String, coins: u64, repeat: u32 },
    Follow,
    Share,
    Subscribe,
    Like { count: u64 },
    GoalProgress { current: u64, target: u64 },
    GoalComplete,
}

impl EventPayload {
    /// The gift name, if this is a gift payload.
    #[must_use]
    pub fn gift_name(&self) -> Option<&str> {
        match self {
            Self::Gift { gift_name, .. } => Some(gift_name.as_str()),
            _ => None,
        }
    }

    /// The coin value, if this is a gift payload.
    #[must_use]
    pub fn coins(&self) -> Option<u64> {
        match self {
            Self::Gift { coins, .. } => Some(*coins),
            _ => None,
        }
    }

    /// The chat message text, if this is a chat payload.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Chat { text } => Some(text.as_str()),
            _ => None,
        }
    }

    /// The like count, if this is a like payload.
    #[must_use]
    pub fn like_count(&self) -> Option<u64> {
        match self {
            Self::Like { count } => Some(*count),
            _ => None,
        }
    }
}

/// Immutable record produced by the ingress adapter. The sole input to the
/// Event Router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub user: EventUser,
    pub payload: EventPayload,
    pub received_at: DateTime<Utc>,
}

impl Event {
    #[must_use]
    pub fn new(user: EventUser, payload: EventPayload) -> Self {
        let kind = match &payload {
            EventPayload::Chat { .. } => EventKind::Chat,
            EventPayload::Gift { .. } => EventKind::Gift,
            EventPayload::Follow => EventKind::Follow,
            EventPayload::Share => EventKind::Share,
            EventPayload::Subscribe => EventKind::Subscribe,
            EventPayload::Like { .. } => EventKind::Like,
            EventPayload::GoalProgress { .. } => EventKind::GoalProgress,
            EventPayload::GoalComplete => EventKind::GoalComplete,
        };
        Self {
            kind,
            user,
            payload,
            received_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_matches_payload() {
        let event = Event::new(
            EventUser::new("u1", "Rose Fan"),
            EventPayload::Gift {
                gift_name: "Rose".into(),
                coins: 10,
                repeat: 1,
            },
        );
        assert_eq!(event.kind, EventKind::Gift);
        assert_eq!(event.payload.gift_name(), Some("Rose"));
        assert_eq!(event.payload.coins(), Some(10));
    }

    #[test]
    fn event_kind_display() {
        assert_eq!(EventKind::GoalProgress.to_string(), "goal-progress");
        assert_eq!(EventKind::Gift.to_string(), "gift");
    }

    #[test]
    fn user_matches_identifier_by_id_or_name() {
        let user = EventUser::new("u1", "Display Name");
        assert!(user.matches_identifier("u1"));
        assert!(user.matches_identifier("Display Name"));
        assert!(!user.matches_identifier("someone-else"));
    }

    #[test]
    fn follower_age_days_computed_from_follow_since() {
        let now = Utc::now();
        let since = now - chrono::Duration::days(30);
        let user = EventUser::new("u1", "n").with_follow_since(since);
        assert_eq!(user.follower_age_days(now), Some(30));
    }

    #[test]
    fn follower_age_days_none_when_unknown() {
        let user = EventUser::new("u1", "n");
        assert_eq!(user.follower_age_days(Utc::now()), None);
    }

    #[test]
    fn event_serde_roundtrip() {
        let event = Event::new(EventUser::new("u1", "n"), EventPayload::Like { count: 5 });
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
