//! Event Journal – the persistent [`EventLog`].
//!
//! Every event is written three ways:
//!
//! 1. appended to a daily file `<dir>/ppe_detection_<YYYY-MM-DD>.log` as
//!    `YYYY-mm-dd HH:MM:SS - LEVEL - message` (local time);
//! 2. kept in a bounded [`RecentLog`] for the operator console;
//! 3. mirrored to `tracing` under the `clearance::events` target.
//!
//! `SUCCESS` has no file level of its own; it is written as `INFO` with a
//! `✅ ` prefix.  File errors are reported through `tracing::warn!` and never
//! reach the caller.

use chrono::{Local, NaiveDate};
use clearance_kernel::{EventLog, RecentLog};
use clearance_types::{LogEvent, Severity};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{error, info, warn};

/// Number of trailing lines shown when viewing a history file.
pub const HISTORY_TAIL_LINES: usize = 100;

const FILE_PREFIX: &str = "ppe_detection_";
const FILE_SUFFIX: &str = ".log";

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from journal file operations.
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("Journal I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Not a journal file name: {0}")]
    InvalidName(String),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> JournalError + '_ {
    move |source| JournalError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Journal
// ─────────────────────────────────────────────────────────────────────────────

/// Daily-file event journal with an in-memory tail.
pub struct Journal {
    dir: PathBuf,
    recent: RecentLog,
    file_lock: Mutex<()>,
}

impl Journal {
    /// Open the journal in `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, JournalError> {
        Self::with_recent(dir, RecentLog::default())
    }

    /// Open the journal with a custom in-memory buffer.
    pub fn with_recent(dir: impl Into<PathBuf>, recent: RecentLog) -> Result<Self, JournalError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        Ok(Self {
            dir,
            recent,
            file_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The in-memory tail of recent events.
    pub fn recent(&self) -> &RecentLog {
        &self.recent
    }

    /// Path of the journal file for `date`.
    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", date.format("%Y-%m-%d")))
    }

    /// Journal file names in the directory, newest first.
    pub fn history_files(&self) -> Result<Vec<String>, JournalError> {
        let mut names: Vec<String> = fs::read_dir(&self.dir)
            .map_err(io_err(&self.dir))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(FILE_SUFFIX))
            .collect();
        names.sort_unstable_by(|a, b| b.cmp(a));
        Ok(names)
    }

    /// Last `max_lines` lines of the journal file `name`.
    ///
    /// `name` must be a bare file name inside the journal directory.
    pub fn tail(&self, name: &str, max_lines: usize) -> Result<Vec<String>, JournalError> {
        if name.is_empty()
            || name.contains(['/', '\\'])
            || name.contains("..")
            || !name.ends_with(FILE_SUFFIX)
        {
            return Err(JournalError::InvalidName(name.to_string()));
        }
        let path = self.dir.join(name);
        let raw = fs::read_to_string(&path).map_err(io_err(&path))?;
        let lines: Vec<&str> = raw.lines().collect();
        let start = lines.len().saturating_sub(max_lines);
        Ok(lines[start..].iter().map(|l| l.to_string()).collect())
    }

    fn append_to_file(&self, event: &LogEvent) -> Result<(), JournalError> {
        let local = event.timestamp.with_timezone(&Local);
        let path = self.file_for(local.date_naive());
        let _guard = self.file_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err(&path))?;
        writeln!(file, "{}", file_line(event)).map_err(io_err(&path))
    }
}

impl EventLog for Journal {
    fn record(&self, event: LogEvent) {
        match event.severity {
            Severity::Error => error!(target: "clearance::events", "{}", event.message),
            Severity::Warning => warn!(target: "clearance::events", "{}", event.message),
            Severity::Success => {
                info!(target: "clearance::events", success = true, "{}", event.message)
            }
            Severity::Info => info!(target: "clearance::events", "{}", event.message),
        }
        if let Err(e) = self.append_to_file(&event) {
            warn!(error = %e, "failed to append event to journal file");
        }
        self.recent.record(event);
    }
}

/// Render an event as one journal file line.
pub fn file_line(event: &LogEvent) -> String {
    let level = match event.severity {
        Severity::Info | Severity::Success => "INFO",
        Severity::Warning => "WARNING",
        Severity::Error => "ERROR",
    };
    let prefix = if event.severity == Severity::Success { "✅ " } else { "" };
    format!(
        "{} - {level} - {prefix}{}",
        event.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
        event.message
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(severity: Severity, message: &str) -> LogEvent {
        LogEvent::new(severity, message, Utc::now())
    }

    #[test]
    fn open_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let journal_dir = dir.path().join("logs");
        let journal = Journal::open(&journal_dir).unwrap();
        assert!(journal_dir.is_dir());
        assert_eq!(journal.dir(), journal_dir.as_path());
    }

    #[test]
    fn record_appends_to_daily_file_and_recent_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        let ev = event(Severity::Error, "Stage 2 failed - check gloves");
        let path = journal.file_for(ev.timestamp.with_timezone(&Local).date_naive());
        journal.record(ev);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains(" - ERROR - Stage 2 failed - check gloves"));
        assert_eq!(journal.recent().len(), 1);
    }

    #[test]
    fn success_is_written_as_info_with_marker() {
        let line = file_line(&event(Severity::Success, "Stage 1 passed"));
        assert!(line.ends_with(" - INFO - ✅ Stage 1 passed"));
    }

    #[test]
    fn warning_keeps_its_level() {
        let line = file_line(&event(Severity::Warning, "status source unavailable"));
        assert!(line.contains(" - WARNING - status source unavailable"));
    }

    #[test]
    fn history_files_are_sorted_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        for date in ["2026-10-14", "2026-10-16", "2026-10-15"] {
            fs::write(dir.path().join(format!("ppe_detection_{date}.log")), "x\n").unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let files = journal.history_files().unwrap();
        assert_eq!(
            files,
            vec![
                "ppe_detection_2026-10-16.log",
                "ppe_detection_2026-10-15.log",
                "ppe_detection_2026-10-14.log",
            ]
        );
    }

    #[test]
    fn tail_returns_last_lines() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        let body: String = (0..150).map(|i| format!("line {i}\n")).collect();
        fs::write(dir.path().join("ppe_detection_2026-10-16.log"), body).unwrap();

        let tail = journal
            .tail("ppe_detection_2026-10-16.log", HISTORY_TAIL_LINES)
            .unwrap();
        assert_eq!(tail.len(), HISTORY_TAIL_LINES);
        assert_eq!(tail[0], "line 50");
        assert_eq!(tail[99], "line 149");
    }

    #[test]
    fn tail_rejects_paths_outside_journal() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        for bad in ["../secret.log", "sub/file.log", "config.toml", ""] {
            assert!(matches!(
                journal.tail(bad, 10),
                Err(JournalError::InvalidName(_))
            ));
        }
    }

    #[test]
    fn tail_of_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        assert!(matches!(
            journal.tail("ppe_detection_1999-01-01.log", 10),
            Err(JournalError::Io { .. })
        ));
    }

    #[test]
    fn unwritable_directory_still_buffers_event() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path().join("logs")).unwrap();
        fs::remove_dir_all(journal.dir()).unwrap();
        journal.record(event(Severity::Info, "kept in memory"));
        assert_eq!(journal.recent().len(), 1);
    }
}
