use chrono::{DateTime, Utc};
use pulsegate_core::{Event, EventKind, EventPayload, EventUser};
use serde::Deserialize;

/// Raw ingress payload, tolerant of the two user-identification schemas the
/// upstream streaming-platform adapter is known to emit (`userId`/`uniqueId`,
/// `userName`/`username`, `teamLevel`/`teamMemberLevel`) and the two gift
/// coin field names (`coins`/`giftCoins`) (spec.md §4.1, §9). This is the
/// *only* place in the core that is aware either schema exists — once
/// [`normalize`] returns an [`Event`], every downstream layer sees one
/// normalized shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEventEnvelope {
    pub kind: EventKind,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub team_level: Option<i64>,
    #[serde(default)]
    pub team_member_level: Option<i64>,
    #[serde(default)]
    pub follow_since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub gift_name: Option<String>,
    #[serde(default)]
    pub coins: Option<u64>,
    #[serde(default)]
    pub gift_coins: Option<u64>,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub goal_current: Option<u64>,
    #[serde(default)]
    pub goal_target: Option<u64>,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

fn default_repeat() -> u32 {
    1
}

/// A raw ingress envelope was missing a field required for its declared
/// `kind`, or carried neither half of a dual-schema pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("event carries neither userId nor uniqueId")]
    MissingUserId,
    #[error("{kind} event is missing required field `{field}`")]
    MissingField { kind: EventKind, field: &'static str },
}

/// Resolve a [`RawEventEnvelope`] into a normalized [`Event`] (spec.md §9:
/// "Model as a single normalized `Event` struct at the R boundary; the
/// dual-name tolerance lives in one adapter function, not smeared across the
/// code"). Repeat-gift expansion is explicitly left to the ingress adapter
/// upstream (spec.md §9 Open Questions) — `repeat` is carried through on the
/// payload unchanged, never expanded into multiple `Event`s here.
pub fn normalize(raw: RawEventEnvelope) -> Result<Event, NormalizeError> {
    let user_id = raw.user_id.or(raw.unique_id).ok_or(NormalizeError::MissingUserId)?;
    let display_name = raw.user_name.or(raw.username).unwrap_or_else(|| user_id.clone());
    let team_level = raw.team_level.or(raw.team_member_level);

    let mut user = EventUser::new(user_id, display_name);
    if let Some(level) = team_level {
        user = user.with_team_level(level);
    }
    if let Some(since) = raw.follow_since {
        user = user.with_follow_since(since);
    }

    let payload = match raw.kind {
        EventKind::Chat => EventPayload::Chat {
            text: raw.text.ok_or(NormalizeError::MissingField {
                kind: raw.kind,
                field: "text",
            })?,
        },
        EventKind::Gift => EventPayload::Gift {
            gift_name: raw.gift_name.ok_or(NormalizeError::MissingField {
                kind: raw.kind,
                field: "giftName",
            })?,
            coins: raw.coins.or(raw.gift_coins).unwrap_or(0),
            repeat: raw.repeat,
        },
        EventKind::Follow => EventPayload::Follow,
        EventKind::Share => EventPayload::Share,
        EventKind::Subscribe => EventPayload::Subscribe,
        EventKind::Like => EventPayload::Like {
            count: raw.like_count.ok_or(NormalizeError::MissingField {
                kind: raw.kind,
                field: "likeCount",
            })?,
        },
        EventKind::GoalProgress => EventPayload::GoalProgress {
            current: raw.goal_current.ok_or(NormalizeError::MissingField {
                kind: raw.kind,
                field: "goalCurrent",
            })?,
            target: raw.goal_target.ok_or(NormalizeError::MissingField {
                kind: raw.kind,
                field: "goalTarget",
            })?,
        },
        EventKind::GoalComplete => EventPayload::GoalComplete,
    };

    Ok(Event {
        kind: raw.kind,
        user,
        payload,
        received_at: raw.received_at.unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_json(kind: &str, extra: &str) -> String {
        format!(r#"{{"kind":"{kind}"{extra}}}"#)
    }

    #[test]
    fn resolves_unique_id_schema() {
        let raw: RawEventEnvelope =
            serde_json::from_str(&base_json("gift", r#","uniqueId":"u1","username":"Rose Fan","giftName":"Rose","giftCoins":5"#)).unwrap();
        let event = normalize(raw).unwrap();
        assert_eq!(event.user.id.as_str(), "u1");
        assert_eq!(event.user.display_name, "Rose Fan");
        assert_eq!(event.payload.coins(), Some(5));
    }

    #[test]
    fn resolves_user_id_schema_preferentially() {
        let raw: RawEventEnvelope = serde_json::from_str(&base_json(
            "follow",
            r#","userId":"u1","uniqueId":"u2","userName":"Primary","username":"Secondary""#,
        ))
        .unwrap();
        let event = normalize(raw).unwrap();
        assert_eq!(event.user.id.as_str(), "u1");
        assert_eq!(event.user.display_name, "Primary");
    }

    #[test]
    fn missing_user_id_is_rejected() {
        let raw: RawEventEnvelope = serde_json::from_str(&base_json("follow", "")).unwrap();
        assert_eq!(normalize(raw), Err(NormalizeError::MissingUserId));
    }

    #[test]
    fn gift_without_gift_name_is_rejected() {
        let raw: RawEventEnvelope = serde_json::from_str(&base_json("gift", r#","userId":"u1","coins":5"#)).unwrap();
        assert_eq!(
            normalize(raw),
            Err(NormalizeError::MissingField {
                kind: EventKind::Gift,
                field: "giftName"
            })
        );
    }

    #[test]
    fn team_member_level_synonym_is_tolerated() {
        let raw: RawEventEnvelope = serde_json::from_str(&base_json("follow", r#","userId":"u1","teamMemberLevel":7"#)).unwrap();
        let event = normalize(raw).unwrap();
        assert_eq!(event.user.team_level, Some(7));
    }

    #[test]
    fn chat_text_round_trips() {
        let raw: RawEventEnvelope = serde_json::from_str(&base_json("chat", r#","userId":"u1","text":"!hello""#)).unwrap();
        let event = normalize(raw).unwrap();
        assert_eq!(event.payload.message(), Some("!hello"));
    }

    #[test]
    fn goal_progress_requires_both_bounds() {
        let raw: RawEventEnvelope = serde_json::from_str(&base_json("goal_progress", r#","userId":"u1","goalCurrent":5"#)).unwrap();
        assert_eq!(
            normalize(raw),
            Err(NormalizeError::MissingField {
                kind: EventKind::GoalProgress,
                field: "goalTarget"
            })
        );
    }
}
