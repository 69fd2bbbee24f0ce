use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::EventKind;
use crate::ids::{CommandItemId, DeviceId, ExecutionId, MappingId, UserId};
use crate::mapping::CommandKind;

/// Why a command item never reached a successful dispatch. Matches the
/// outcome vocabulary of spec.md §7's error handling table so every layer
/// (mapping engine, safety arbiter, dispatcher) reports in the same terms an
/// observability side-channel can aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Rejected by the Safety Arbiter (over a global or per-mapping cap on
    /// intensity, duration, or rate).
    SafetyIntensity,
    SafetyDuration,
    SafetyGlobalRate,
    SafetyUserRate,
    /// The emergency-stop latch was engaged at submission or dispatch time.
    EmergencyStop,
    /// The bounded queue was at capacity (`Qmax`) when submission was attempted.
    QueueFull,
    /// The owning pattern execution was cancelled before this step fired.
    Cancelled,
    /// The device backend reported a non-retryable auth error (401/403).
    Auth,
    /// The device backend returned a response the adapter could not parse
    /// as the expected shape; never retried.
    UnexpectedResponse,
    /// Retries were exhausted against the device backend.
    ExceededRetries,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SafetyIntensity => "safety_intensity",
            Self::SafetyDuration => "safety_duration",
            Self::SafetyGlobalRate => "safety_global_rate",
            Self::SafetyUserRate => "safety_user_rate",
            Self::EmergencyStop => "emergency_stop",
            Self::QueueFull => "queue_full",
            Self::Cancelled => "cancelled",
            Self::Auth => "auth",
            Self::UnexpectedResponse => "unexpected_response",
            Self::ExceededRetries => "exceeded_retries",
        };
        f.write_str(s)
    }
}

/// Lifecycle status of a single command item on the queue (§3: "Pending →
/// Scheduled (waiting) → InFlight → Done | Failed | Dropped(reason)").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    /// Submitted, not yet considered by a worker.
    Pending,
    /// Considered by a worker but not yet ready (`scheduledNotBefore` in the future).
    Scheduled,
    /// A worker has claimed the item and is attempting dispatch.
    InFlight { attempt: u32 },
    Done,
    /// Terminal failure after at least one dispatch attempt: an auth
    /// rejection, or retries exhausted. Distinct from `Dropped`: a `Failed`
    /// item was actually handed to the device backend at least once
    /// (spec.md §4.3 step 6, §7).
    Failed { reason: DropReason },
    Dropped { reason: DropReason },
}

impl ItemStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. } | Self::Dropped { .. })
    }
}

/// A single atomic unit of work on the command queue: either the direct
/// result of a mapping match, or one expanded command step of a pattern
/// execution (§3 "Command Item").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandItem {
    pub id: CommandItemId,
    pub device_id: DeviceId,
    pub command_kind: CommandKind,
    pub intensity: u8,
    pub duration_ms: u32,
    pub priority: u8,
    /// The mapping that produced this item, directly or via a pattern.
    pub mapping_id: MappingId,
    /// Set when this item is one step of a pattern execution; used for
    /// cooperative cancellation of the remaining steps.
    #[serde(default)]
    pub execution_id: Option<ExecutionId>,
    /// Position within the owning execution, for ordering diagnostics.
    #[serde(default)]
    pub step_index: Option<usize>,
    /// Earliest time this item may be dispatched. `None` means "as soon as
    /// queue ordering permits".
    #[serde(default)]
    pub scheduled_not_before: Option<DateTime<Utc>>,
    pub origin_user_id: UserId,
    pub origin_event_kind: EventKind,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    pub status: ItemStatus,
}

impl CommandItem {
    #[must_use]
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_not_before.is_none_or(|not_before| not_before <= now)
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Ordering key for the bounded priority queue (§4.3: priority desc, then
/// `scheduledNotBefore` asc, then `submittedAt` asc). Ascending `Ord` on this
/// key yields highest-priority-first, matching a `BinaryHeap<Reverse<..>>`
/// min-heap-as-priority-queue idiom directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOrderKey {
    priority_desc: std::cmp::Reverse<u8>,
    scheduled_not_before: Option<DateTime<Utc>>,
    submitted_at: DateTime<Utc>,
}

impl QueueOrderKey {
    #[must_use]
    pub fn new(item: &CommandItem) -> Self {
        Self {
            priority_desc: std::cmp::Reverse(item.priority),
            scheduled_not_before: item.scheduled_not_before,
            submitted_at: item.submitted_at,
        }
    }
}

impl PartialOrd for QueueOrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueOrderKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority_desc
            .cmp(&other.priority_desc)
            .then_with(|| self.scheduled_not_before.cmp(&other.scheduled_not_before))
            .then_with(|| self.submitted_at.cmp(&other.submitted_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(priority: u8, scheduled_not_before: Option<DateTime<Utc>>, submitted_at: DateTime<Utc>) -> CommandItem {
        CommandItem {
            id: CommandItemId::new(),
            device_id: DeviceId::new("d1"),
            command_kind: CommandKind::Vibrate,
            intensity: 50,
            duration_ms: 1000,
            priority,
            mapping_id: MappingId::new("m1"),
            execution_id: None,
            step_index: None,
            scheduled_not_before,
            origin_user_id: UserId::new("u1"),
            origin_event_kind: EventKind::Gift,
            submitted_at,
            attempts: 0,
            status: ItemStatus::Pending,
        }
    }

    #[test]
    fn higher_priority_sorts_first() {
        let now = Utc::now();
        let low = QueueOrderKey::new(&item(1, None, now));
        let high = QueueOrderKey::new(&item(9, None, now));
        assert!(high < low);
    }

    #[test]
    fn equal_priority_breaks_tie_by_scheduled_not_before_then_submitted_at() {
        let now = Utc::now();
        let later_sched = now + chrono::Duration::seconds(5);
        let a = QueueOrderKey::new(&item(5, Some(now), now));
        let b = QueueOrderKey::new(&item(5, Some(later_sched), now));
        assert!(a < b);

        let c = QueueOrderKey::new(&item(5, None, now));
        let d = QueueOrderKey::new(&item(5, None, now + chrono::Duration::seconds(1)));
        assert!(c < d);
    }

    #[test]
    fn is_ready_respects_scheduled_not_before() {
        let now = Utc::now();
        let future = item(5, Some(now + chrono::Duration::seconds(10)), now);
        assert!(!future.is_ready(now));
        assert!(future.is_ready(now + chrono::Duration::seconds(11)));

        let unscheduled = item(5, None, now);
        assert!(unscheduled.is_ready(now));
    }

    #[test]
    fn terminal_status_detection() {
        let mut it = item(5, None, Utc::now());
        assert!(!it.is_terminal());
        it.status = ItemStatus::Done;
        assert!(it.is_terminal());
        it.status = ItemStatus::Dropped {
            reason: DropReason::QueueFull,
        };
        assert!(it.is_terminal());
    }

    #[test]
    fn drop_reason_display() {
        assert_eq!(DropReason::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn command_item_serde_roundtrip() {
        let it = item(5, None, Utc::now());
        let json = serde_json::to_string(&it).unwrap();
        let back: CommandItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, it);
    }
}
