//! Event Router (§2 layer R): normalizes raw, dual-schema ingress payloads
//! into a single [`pulsegate_core::Event`] shape, and the `Core` facade that
//! wires the Mapping Engine, Pattern/Flow Engine, Command Queue & Dispatcher,
//! Safety Arbiter, and Device Backend Adapter together end to end.

mod error;
mod facade;
mod normalize;
mod patterns;

pub use error::RouterError;
pub use facade::Core;
pub use normalize::{normalize, NormalizeError, RawEventEnvelope};
pub use patterns::PatternRegistry;
