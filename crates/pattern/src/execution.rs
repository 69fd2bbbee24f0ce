use chrono::{DateTime, Utc};
use pulsegate_core::{DeviceId, ExecutionId, PatternId};
use tokio_util::sync::CancellationToken;

/// Record created when P expands a pattern; removed once all its command
/// items settle or cancellation has propagated (§3 "Pattern Execution").
///
/// Cancellation is promoted from the source's polled boolean flag to a
/// first-class [`CancellationToken`] per execution id (§9): the dispatcher
/// observes `token.is_cancelled()` instead of polling a shared map.
#[derive(Debug, Clone)]
pub struct PatternExecution {
    pub execution_id: ExecutionId,
    pub pattern_id: PatternId,
    pub device_id: DeviceId,
    pub started_at: DateTime<Utc>,
    token: CancellationToken,
}

impl PatternExecution {
    #[must_use]
    pub fn new(pattern_id: PatternId, device_id: DeviceId, started_at: DateTime<Utc>) -> Self {
        Self {
            execution_id: ExecutionId::new(),
            pattern_id,
            device_id,
            started_at,
            token: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// A cloneable handle dispatcher workers can hold onto without keeping
    /// the whole execution record alive.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        let exec = PatternExecution::new(PatternId::new("p1"), DeviceId::new("d1"), Utc::now());
        assert!(!exec.is_cancelled());
    }

    #[test]
    fn cancel_is_observed_via_cloned_token() {
        let exec = PatternExecution::new(PatternId::new("p1"), DeviceId::new("d1"), Utc::now());
        let token = exec.cancellation_token();
        exec.cancel();
        assert!(token.is_cancelled());
        assert!(exec.is_cancelled());
    }
}
