//! Generic `StatusSource` trait for whatever produces presence and equipment
//! readings (a database row written by a detector, a simulator, …).

use clearance_types::{ClearanceError, StatusSnapshot};

/// A polled oracle for the latest [`StatusSnapshot`].
///
/// The poll loop owns the source; the controller never sees it.
pub trait StatusSource: Send {
    /// Return the latest complete snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ClearanceError::SourceUnavailable`] when no complete record
    /// can be read.  The caller skips that tick.
    fn read(&mut self) -> Result<StatusSnapshot, ClearanceError>;
}
