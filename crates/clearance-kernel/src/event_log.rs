//! [`EventLog`] – the append-only sink the controller reports into.
//!
//! The controller never reads the log back; it only hands over
//! [`LogEvent`]s in call order.  Implementations must return quickly and must
//! not fail the caller; I/O problems are theirs to report.
//!
//! [`RecentLog`] is the bounded in-memory implementation: it keeps the last
//! *N* entries for operator display and drops the oldest ones first.
//!
//! # Example
//!
//! ```rust
//! use clearance_kernel::event_log::{EventLog, RecentLog};
//! use clearance_types::{LogEvent, Severity};
//!
//! let log = RecentLog::new(2);
//! log.record(LogEvent::new(Severity::Info, "one", chrono::Utc::now()));
//! log.record(LogEvent::new(Severity::Info, "two", chrono::Utc::now()));
//! log.record(LogEvent::new(Severity::Error, "three", chrono::Utc::now()));
//!
//! let messages: Vec<String> = log.entries().into_iter().map(|e| e.message).collect();
//! assert_eq!(messages, ["two", "three"]);
//! ```

use chrono::Local;
use clearance_types::LogEvent;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Number of entries the operator console keeps in memory.
pub const RECENT_LOG_CAPACITY: usize = 30;

// ─────────────────────────────────────────────────────────────────────────────
// EventLog trait
// ─────────────────────────────────────────────────────────────────────────────

/// Append-only sink for `(message, severity)` events.
pub trait EventLog: Send + Sync {
    /// Append `event`.  Must not block for more than a short, bounded time.
    fn record(&self, event: LogEvent);
}

// ─────────────────────────────────────────────────────────────────────────────
// RecentLog
// ─────────────────────────────────────────────────────────────────────────────

/// Bounded ring buffer of the most recent events.
pub struct RecentLog {
    capacity: usize,
    entries: Mutex<VecDeque<LogEvent>>,
}

impl RecentLog {
    /// Create a buffer that keeps at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Snapshot of the buffered entries, oldest first.
    pub fn entries(&self) -> Vec<LogEvent> {
        self.lock().iter().cloned().collect()
    }

    /// Entries rendered as `[YYYY-mm-dd HH:MM:SS] [SEVERITY] message` in
    /// local time, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lock().iter().map(render_line).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<LogEvent>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RecentLog {
    fn default() -> Self {
        Self::new(RECENT_LOG_CAPACITY)
    }
}

impl EventLog for RecentLog {
    fn record(&self, event: LogEvent) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(event);
    }
}

/// Render one event the way the operator console shows it.
pub fn render_line(event: &LogEvent) -> String {
    format!(
        "[{}] [{}] {}",
        event.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
        event.severity,
        event.message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clearance_types::Severity;

    fn event(severity: Severity, message: &str) -> LogEvent {
        LogEvent::new(severity, message, Utc::now())
    }

    #[test]
    fn keeps_entries_in_call_order() {
        let log = RecentLog::new(10);
        log.record(event(Severity::Info, "a"));
        log.record(event(Severity::Success, "b"));
        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "a");
        assert_eq!(entries[1].severity, Severity::Success);
    }

    #[test]
    fn drops_oldest_beyond_capacity() {
        let log = RecentLog::default();
        for i in 0..(RECENT_LOG_CAPACITY + 5) {
            log.record(event(Severity::Info, &format!("msg {i}")));
        }
        let entries = log.entries();
        assert_eq!(entries.len(), RECENT_LOG_CAPACITY);
        assert_eq!(entries[0].message, "msg 5");
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let log = RecentLog::new(0);
        log.record(event(Severity::Error, "lost"));
        assert!(log.is_empty());
    }

    #[test]
    fn rendered_line_contains_severity_and_message() {
        let line = render_line(&event(Severity::Warning, "status source unavailable"));
        assert!(line.starts_with('['));
        assert!(line.contains("] [WARNING] status source unavailable"));
    }
}
