//! Pattern/Flow Engine (§4.2): deterministic expansion of a named multi-step
//! program into scheduled command steps sharing one execution id, plus
//! cooperative cancellation of not-yet-dispatched steps.

mod engine;
mod execution;

pub use engine::{ExpandedStep, PatternEngine};
pub use execution::PatternExecution;
