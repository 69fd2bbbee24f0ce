//! Safety Arbiter (§4.4): validates proposed commands against global caps,
//! per-user rate limits, and the emergency-stop latch. Pure logic plus a
//! concurrent ledger; no I/O, no async dispatch of its own.

mod arbiter;
mod config;
mod latch;
mod ledger;

pub use arbiter::{Decision, ProposedCommand, SafetyArbiter};
pub use config::{SafetyConfig, UserLimits};
pub use latch::EmergencyLatch;
pub use ledger::RateLedger;
