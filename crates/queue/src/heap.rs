use std::cmp::Reverse;
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};
use pulsegate_core::{CommandItem, QueueOrderKey};

/// Wraps a [`CommandItem`] so a [`BinaryHeap`] (a max-heap) pops the most
/// urgent item first: highest priority, then earliest `scheduledNotBefore`,
/// then earliest `submittedAt` (§4.3).
struct HeapEntry(CommandItem);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        QueueOrderKey::new(&self.0) == QueueOrderKey::new(&other.0)
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; QueueOrderKey's ascending order is
        // "most urgent first", so reverse it to make the most urgent entry
        // compare as the maximum.
        Reverse(QueueOrderKey::new(&self.0)).cmp(&Reverse(QueueOrderKey::new(&other.0)))
    }
}

/// Bounded, priority-ordered store of not-yet-dispatched command items
/// (§4.3). Not `Sync` by itself — callers wrap it in a mutex; kept as a
/// plain data structure so its ordering behavior is unit-testable in
/// isolation from any locking strategy.
#[derive(Default)]
pub struct PriorityQueue {
    heap: BinaryHeap<HeapEntry>,
    capacity: usize,
}

impl PriorityQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            capacity,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Push an item. Returns it back, unmodified, without touching the
    /// queue if already at `Qmax` (§4.3 back-pressure) — the caller still
    /// owns it and can settle it as dropped.
    #[must_use]
    pub fn push(&mut self, item: CommandItem) -> Option<CommandItem> {
        if self.is_full() {
            return Some(item);
        }
        self.heap.push(HeapEntry(item));
        None
    }

    /// Pop the most urgent item regardless of whether it is actually ready
    /// yet — callers check `is_ready` themselves, since the queue has no
    /// notion of "now".
    pub fn pop(&mut self) -> Option<CommandItem> {
        self.heap.pop().map(|entry| entry.0)
    }

    /// Pop the highest-priority item that is ready to dispatch at `now`
    /// (§4.3 step 1-2: "pop the highest-priority **ready** item"), skipping
    /// over any not-yet-ready items ahead of it in priority order without
    /// disturbing their position relative to each other.
    pub fn pop_ready(&mut self, now: DateTime<Utc>) -> Option<CommandItem> {
        let mut skipped = Vec::new();
        let found = loop {
            match self.heap.pop() {
                None => break None,
                Some(entry) if entry.0.is_ready(now) => break Some(entry.0),
                Some(entry) => skipped.push(entry),
            }
        };
        for entry in skipped {
            self.heap.push(entry);
        }
        found
    }

    /// The earliest `scheduledNotBefore` among all queued items, or `None`
    /// if the queue is empty or every item is already ready (i.e. has no
    /// `scheduledNotBefore` or one that is already `<= now`). Used by a
    /// worker to size its sleep when [`Self::pop_ready`] finds nothing.
    #[must_use]
    pub fn earliest_not_before(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.heap
            .iter()
            .filter_map(|entry| entry.0.scheduled_not_before)
            .filter(|t| *t > now)
            .min()
    }

    /// Remove and return every item currently queued, in arbitrary order —
    /// used to drain to `Dropped(emergency_stop)` (§4.3).
    pub fn drain_all(&mut self) -> Vec<CommandItem> {
        self.heap.drain().map(|entry| entry.0).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use pulsegate_core::{CommandItemId, CommandKind, DeviceId, EventKind, ItemStatus, MappingId, UserId};

    fn item(priority: u8, submitted_at: DateTime<Utc>) -> CommandItem {
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
            scheduled_not_before: None,
            origin_user_id: UserId::new("u1"),
            origin_event_kind: EventKind::Gift,
            submitted_at,
            attempts: 0,
            status: ItemStatus::Pending,
        }
    }

    #[test]
    fn pops_highest_priority_first() {
        let mut queue = PriorityQueue::new(10);
        let now = Utc::now();
        queue.push(item(1, now));
        queue.push(item(9, now));
        queue.push(item(5, now));
        assert_eq!(queue.pop().unwrap().priority, 9);
        assert_eq!(queue.pop().unwrap().priority, 5);
        assert_eq!(queue.pop().unwrap().priority, 1);
    }

    #[test]
    fn equal_priority_breaks_tie_by_submitted_at() {
        let mut queue = PriorityQueue::new(10);
        let now = Utc::now();
        let later = now + Duration::seconds(1);
        queue.push(item(5, later));
        queue.push(item(5, now));
        assert_eq!(queue.pop().unwrap().submitted_at, now);
        assert_eq!(queue.pop().unwrap().submitted_at, later);
    }

    #[test]
    fn push_fails_once_at_capacity() {
        let mut queue = PriorityQueue::new(1);
        let now = Utc::now();
        assert!(queue.push(item(1, now)).is_none());
        assert!(queue.push(item(1, now)).is_some());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn drain_all_empties_the_queue() {
        let mut queue = PriorityQueue::new(10);
        let now = Utc::now();
        queue.push(item(1, now));
        queue.push(item(2, now));
        let drained = queue.drain_all();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }

    fn scheduled_item(priority: u8, scheduled_not_before: Option<DateTime<Utc>>, now: DateTime<Utc>) -> CommandItem {
        let mut it = item(priority, now);
        it.scheduled_not_before = scheduled_not_before;
        it
    }

    #[test]
    fn pop_ready_skips_a_not_yet_ready_higher_priority_item() {
        let mut queue = PriorityQueue::new(10);
        let now = Utc::now();
        // Higher priority, but not ready for another 10s.
        queue.push(scheduled_item(10, Some(now + Duration::seconds(10)), now));
        // Lower priority, ready now.
        queue.push(scheduled_item(1, None, now));

        let popped = queue.pop_ready(now).unwrap();
        assert_eq!(popped.priority, 1);
        // The not-yet-ready item is still queued, not lost.
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn pop_ready_prefers_highest_priority_among_ready_items() {
        let mut queue = PriorityQueue::new(10);
        let now = Utc::now();
        queue.push(scheduled_item(1, None, now));
        queue.push(scheduled_item(9, None, now));
        queue.push(scheduled_item(10, Some(now + Duration::seconds(10)), now));

        assert_eq!(queue.pop_ready(now).unwrap().priority, 9);
        assert_eq!(queue.pop_ready(now).unwrap().priority, 1);
        assert!(queue.pop_ready(now).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn pop_ready_returns_none_when_nothing_is_ready() {
        let mut queue = PriorityQueue::new(10);
        let now = Utc::now();
        queue.push(scheduled_item(5, Some(now + Duration::seconds(5)), now));
        assert!(queue.pop_ready(now).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn earliest_not_before_finds_the_soonest_pending_item() {
        let mut queue = PriorityQueue::new(10);
        let now = Utc::now();
        queue.push(scheduled_item(1, Some(now + Duration::seconds(10)), now));
        queue.push(scheduled_item(9, Some(now + Duration::seconds(3)), now));
        queue.push(scheduled_item(5, None, now));

        assert_eq!(queue.earliest_not_before(now), Some(now + Duration::seconds(3)));
    }

    #[test]
    fn earliest_not_before_is_none_when_queue_empty() {
        let queue = PriorityQueue::new(10);
        assert_eq!(queue.earliest_not_before(Utc::now()), None);
    }
}
