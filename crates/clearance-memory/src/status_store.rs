//! SQLite-backed status record.
//!
//! The detector process keeps a single row up to date with the latest
//! presence and equipment verdicts.  [`SqliteStatusStore`] reads that row as a
//! [`StatusSnapshot`] and implements [`StatusSource`] for the poll loop.
//!
//! The detector owns the database.  The gate attaches with
//! [`SqliteStatusStore::open_read_only`], which never creates the file or the
//! table; [`SqliteStatusStore::open`] and [`SqliteStatusStore::write`] exist
//! for simulators and tests.
//!
//! # Storage layout
//!
//! | column       | type    | description                                 |
//! |--------------|---------|---------------------------------------------|
//! | id           | INTEGER | primary key; the status row is `1`          |
//! | has_person   | TEXT    | `"pass"` when a person is in view           |
//! | helmet       | TEXT    | `"pass"` / `"fail"`                         |
//! | goggles      | TEXT    | `"pass"` / `"fail"`                         |
//! | gloves       | TEXT    | `"pass"` / `"fail"`                         |
//! | boots        | TEXT    | `"pass"` / `"fail"`                         |
//! | suit         | TEXT    | `"pass"` / `"fail"`                         |
//! | mask         | TEXT    | `"pass"` / `"fail"`                         |
//! | last_updated | TEXT    | RFC 3339 or `YYYY-mm-dd HH:MM:SS` (local)   |
//!
//! `NULL` or any value other than `"pass"` reads as a failure.
//!
//! # Example
//!
//! ```rust
//! use clearance_memory::status_store::SqliteStatusStore;
//! use clearance_types::{EquipmentItem, EquipmentReading, StatusSnapshot};
//!
//! let store = SqliteStatusStore::open_in_memory().unwrap();
//! let snap = StatusSnapshot::new(true, chrono::Utc::now())
//!     .with(EquipmentItem::Helmet, EquipmentReading::Pass);
//! store.write(&snap).unwrap();
//!
//! let back = store.fetch().unwrap();
//! assert!(back.person_present);
//! assert!(back.reading(EquipmentItem::Helmet).is_pass());
//! ```

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use clearance_kernel::StatusSource;
use clearance_types::{
    ClearanceError, EquipmentItem, EquipmentReading, EquipmentReadings, StatusSnapshot,
};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Primary key of the single status row.
pub const STATUS_ROW_ID: i64 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise while reading or writing the status record.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("No status row with id {0}")]
    MissingRow(i64),
}

impl StoreError {
    /// `true` when the database is usable but the detector has not written
    /// its row yet.
    pub fn is_missing_row(&self) -> bool {
        matches!(self, StoreError::MissingRow(_))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Raw row
// ─────────────────────────────────────────────────────────────────────────────

struct RawStatusRow {
    has_person: Option<String>,
    equipment: [Option<String>; 6],
    last_updated: Option<String>,
}

impl RawStatusRow {
    fn into_snapshot(self, read_at: DateTime<Utc>) -> StatusSnapshot {
        let mut equipment = EquipmentReadings::default();
        for (item, raw) in EquipmentItem::ALL.into_iter().zip(&self.equipment) {
            equipment.set(item, EquipmentReading::from_raw(raw.as_deref()));
        }
        let observed_at = parse_last_updated(self.last_updated.as_deref()).unwrap_or_else(|| {
            debug!(raw = ?self.last_updated, "unusable last_updated; using read time");
            read_at
        });
        StatusSnapshot {
            person_present: EquipmentReading::from_raw(self.has_person.as_deref()).is_pass(),
            equipment,
            observed_at,
        }
    }
}

/// Parse the `last_updated` column.  Accepts RFC 3339, or a naive
/// `YYYY-mm-dd HH:MM:SS` timestamp interpreted in local time.
pub fn parse_last_updated(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
}

// ─────────────────────────────────────────────────────────────────────────────
// SqliteStatusStore
// ─────────────────────────────────────────────────────────────────────────────

/// Reader (and, for simulators, writer) of the persisted status row.
pub struct SqliteStatusStore {
    conn: Connection,
}

impl SqliteStatusStore {
    /// Open (or create) the status database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Attach to an existing status database without write access.
    ///
    /// Fails when the file does not exist.  The schema is left untouched, so
    /// a database without the status table surfaces as a [`StoreError::Sqlite`]
    /// on the first [`fetch`](Self::fetch).
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Open a temporary in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create the status table if it does not already exist.
    pub fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS ppe_detection (
                id           INTEGER PRIMARY KEY,
                has_person   TEXT,
                helmet       TEXT,
                goggles      TEXT,
                gloves       TEXT,
                boots        TEXT,
                suit         TEXT,
                mask         TEXT,
                last_updated TEXT
            );",
        )?;
        Ok(())
    }

    /// Read the status row.
    ///
    /// Returns [`StoreError::MissingRow`] when the detector has not written
    /// it yet.
    pub fn fetch(&self) -> Result<StatusSnapshot, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT has_person, helmet, goggles, gloves, boots, suit, mask, last_updated
                 FROM ppe_detection
                 WHERE id = ?1",
                [STATUS_ROW_ID],
                |row| {
                    Ok(RawStatusRow {
                        has_person: row.get(0)?,
                        equipment: [
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                        ],
                        last_updated: row.get(7)?,
                    })
                },
            )
            .optional()?;
        row.map(|r| r.into_snapshot(Utc::now()))
            .ok_or(StoreError::MissingRow(STATUS_ROW_ID))
    }

    /// Overwrite the status row with `snapshot`.
    pub fn write(&self, snapshot: &StatusSnapshot) -> Result<(), StoreError> {
        let has_person = if snapshot.person_present {
            EquipmentReading::Pass
        } else {
            EquipmentReading::Fail
        };
        let eq = &snapshot.equipment;
        self.conn.execute(
            "INSERT OR REPLACE INTO ppe_detection
                 (id, has_person, helmet, goggles, gloves, boots, suit, mask, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                STATUS_ROW_ID,
                has_person.as_str(),
                eq.helmet.as_str(),
                eq.goggles.as_str(),
                eq.gloves.as_str(),
                eq.boots.as_str(),
                eq.suit.as_str(),
                eq.mask.as_str(),
                snapshot.observed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl StatusSource for SqliteStatusStore {
    fn read(&mut self) -> Result<StatusSnapshot, ClearanceError> {
        self.fetch()
            .map_err(|e| ClearanceError::SourceUnavailable(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
