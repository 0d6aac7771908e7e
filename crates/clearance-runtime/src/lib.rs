//! `clearance-runtime` – the polling runtime around the clearance kernel.
//!
//! # Modules
//!
//! - [`poller`] – [`Poller`][poller::Poller]: reads the
//!   [`StatusSource`][clearance_kernel::StatusSource] on a fixed `tokio`
//!   interval and ticks the shared
//!   [`StageController`][clearance_kernel::StageController], skipping cycles
//!   in which no snapshot could be read.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.

pub mod poller;
pub mod telemetry;

pub use poller::{DEFAULT_POLL_INTERVAL, Poller, SharedController, lock, share};
pub use telemetry::{TracerProviderGuard, init_tracing};
