use pulsegate_core::CooldownConfig;
use serde::{Deserialize, Serialize};

/// Per-user limits layered on top of the global rate cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLimits {
    #[serde(default)]
    pub min_follower_age_days: Option<i64>,
    #[serde(default)]
    pub max_commands_per_user: Option<u32>,
}

/// Global Safety Arbiter configuration (§4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyConfig {
    pub max_intensity: u8,
    pub max_duration_ms: u32,
    pub max_commands_per_minute: u32,
    #[serde(default)]
    pub default_cooldowns: CooldownConfig,
    #[serde(default)]
    pub user_limits: UserLimits,
    /// Master switch for the emergency-stop feature. When `false`, the
    /// latch is never consulted by `validate` (it can still be toggled by
    /// an admin surface, but has no effect) — distinct from the latch's own
    /// dynamic triggered/cleared state, which `EmergencyLatch` tracks.
    #[serde(default = "default_true")]
    pub emergency_stop_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SafetyConfig {
    /// Conservative defaults matching the ranges in spec.md §3.
    fn default() -> Self {
        Self {
            max_intensity: 100,
            max_duration_ms: 30_000,
            max_commands_per_minute: 60,
            default_cooldowns: CooldownConfig::default(),
            user_limits: UserLimits::default(),
            emergency_stop_enabled: true,
        }
    }
}
