//! Shared data model for the pulsegate event routing and action execution core.
//!
//! This crate carries no async runtime dependency and no I/O — it is the pure
//! vocabulary (`Event`, `Mapping`, `Pattern`, `CommandItem`, ids, drop
//! reasons) that every other `pulsegate-*` crate builds on.

mod command;
mod event;
mod ids;
mod mapping;
mod pattern;

pub use command::{CommandItem, DropReason, ItemStatus, QueueOrderKey};
pub use event::{Event, EventKind, EventPayload, EventUser};
pub use ids::{CommandItemId, DeviceId, ExecutionId, MappingId, PatternId, UserId};
pub use mapping::{
    CommandKind, Conditions, CooldownConfig, Mapping, MappingAction, MappingSafetyCaps,
    MappingValidationError, MAX_DURATION_MS, MAX_INTENSITY, MAX_PRIORITY, MIN_DURATION_MS,
    MIN_INTENSITY, MIN_PRIORITY,
};
pub use pattern::{Pattern, PatternStep, PatternValidationError};
