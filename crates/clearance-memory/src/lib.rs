//! `clearance-memory` – persistence adapters for the clearance gate.
//!
//! # Modules
//!
//! - [`status_store`] – [`SqliteStatusStore`][status_store::SqliteStatusStore]:
//!   reads the detector's single status row from SQLite and serves it to the
//!   poll loop as a [`StatusSource`][clearance_kernel::StatusSource].
//! - [`journal`] – [`Journal`][journal::Journal]: the persistent
//!   [`EventLog`][clearance_kernel::EventLog], writing daily log files and
//!   keeping the recent tail in memory.

pub mod journal;
pub mod status_store;

pub use journal::{HISTORY_TAIL_LINES, Journal, JournalError};
pub use status_store::{SqliteStatusStore, StoreError};
