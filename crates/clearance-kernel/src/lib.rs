//! `clearance-kernel` – the PPE clearance state machine.
//!
//! Pure, synchronous decision logic.  It does not read databases or write
//! files; it consumes snapshots and reports into an event log.
//!
//! # Modules
//!
//! - [`controller`] – [`StageController`][controller::StageController]:
//!   owns the [`StageState`][controller::StageState] and advances it one
//!   snapshot at a time, applying the person-absence and completion timeouts
//!   and the operator's manual advance / reset.
//! - [`stage_rules`] – evaluates a snapshot against one
//!   [`StageDefinition`][clearance_types::StageDefinition] (pass first, then
//!   fail).
//! - [`timeouts`] – [`TimeoutPolicy`][timeouts::TimeoutPolicy]: validated
//!   timeout configuration and the clock-regression-safe elapsed check.
//! - [`event_log`] – the [`EventLog`][event_log::EventLog] port and the
//!   bounded [`RecentLog`][event_log::RecentLog] buffer.
//! - [`status_source`] – the [`StatusSource`][status_source::StatusSource]
//!   port polled by the runtime.

pub mod controller;
pub mod event_log;
pub mod stage_rules;
pub mod status_source;
pub mod timeouts;

pub use controller::{ResetReason, StageController, StageState, TickOutcome};
pub use event_log::{EventLog, RECENT_LOG_CAPACITY, RecentLog};
pub use stage_rules::{StageVerdict, evaluate};
pub use status_source::StatusSource;
pub use timeouts::TimeoutPolicy;
