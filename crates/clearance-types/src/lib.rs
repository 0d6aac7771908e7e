use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// A single piece of protective equipment reported by the status source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentItem {
    Helmet,
    Goggles,
    Gloves,
    Boots,
    Suit,
    Mask,
}

impl EquipmentItem {
    /// Every item in stage order.
    pub const ALL: [EquipmentItem; 6] = [
        EquipmentItem::Helmet,
        EquipmentItem::Goggles,
        EquipmentItem::Gloves,
        EquipmentItem::Boots,
        EquipmentItem::Suit,
        EquipmentItem::Mask,
    ];

    /// Column / record key used by the persisted status row.
    pub fn key(self) -> &'static str {
        match self {
            EquipmentItem::Helmet => "helmet",
            EquipmentItem::Goggles => "goggles",
            EquipmentItem::Gloves => "gloves",
            EquipmentItem::Boots => "boots",
            EquipmentItem::Suit => "suit",
            EquipmentItem::Mask => "mask",
        }
    }

    /// Human-readable label used in operator-facing log messages.
    pub fn label(self) -> &'static str {
        match self {
            EquipmentItem::Helmet => "safety helmet",
            EquipmentItem::Goggles => "goggles",
            EquipmentItem::Gloves => "gloves",
            EquipmentItem::Boots => "safety boots",
            EquipmentItem::Suit => "protective suit",
            EquipmentItem::Mask => "face mask",
        }
    }
}

impl fmt::Display for EquipmentItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Two-valued detector verdict for one item.
///
/// Anything the upstream detector could not classify is collapsed to
/// [`EquipmentReading::Fail`] before it reaches the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentReading {
    Pass,
    #[default]
    Fail,
}

impl EquipmentReading {
    /// Interpret a raw record value. Only the exact string `"pass"` counts as
    /// a pass; `None`, empty strings and unknown values become `Fail`.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some("pass") => EquipmentReading::Pass,
            _ => EquipmentReading::Fail,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EquipmentReading::Pass => "pass",
            EquipmentReading::Fail => "fail",
        }
    }

    pub fn is_pass(self) -> bool {
        self == EquipmentReading::Pass
    }
}

/// Readings for all six items, one typed field per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EquipmentReadings {
    pub helmet: EquipmentReading,
    pub goggles: EquipmentReading,
    pub gloves: EquipmentReading,
    pub boots: EquipmentReading,
    pub suit: EquipmentReading,
    pub mask: EquipmentReading,
}

impl EquipmentReadings {
    /// Every item set to `reading`.
    pub fn uniform(reading: EquipmentReading) -> Self {
        Self {
            helmet: reading,
            goggles: reading,
            gloves: reading,
            boots: reading,
            suit: reading,
            mask: reading,
        }
    }

    pub fn get(&self, item: EquipmentItem) -> EquipmentReading {
        match item {
            EquipmentItem::Helmet => self.helmet,
            EquipmentItem::Goggles => self.goggles,
            EquipmentItem::Gloves => self.gloves,
            EquipmentItem::Boots => self.boots,
            EquipmentItem::Suit => self.suit,
            EquipmentItem::Mask => self.mask,
        }
    }

    pub fn set(&mut self, item: EquipmentItem, reading: EquipmentReading) {
        let slot = match item {
            EquipmentItem::Helmet => &mut self.helmet,
            EquipmentItem::Goggles => &mut self.goggles,
            EquipmentItem::Gloves => &mut self.gloves,
            EquipmentItem::Boots => &mut self.boots,
            EquipmentItem::Suit => &mut self.suit,
            EquipmentItem::Mask => &mut self.mask,
        };
        *slot = reading;
    }
}

/// One polled reading of presence and equipment status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub person_present: bool,
    pub equipment: EquipmentReadings,
    /// Last-update time reported by the status record.
    pub observed_at: DateTime<Utc>,
}

impl StatusSnapshot {
    /// Snapshot with every equipment item failing.
    pub fn new(person_present: bool, observed_at: DateTime<Utc>) -> Self {
        Self {
            person_present,
            equipment: EquipmentReadings::default(),
            observed_at,
        }
    }

    /// Builder-style setter for a single item.
    pub fn with(mut self, item: EquipmentItem, reading: EquipmentReading) -> Self {
        self.equipment.set(item, reading);
        self
    }

    pub fn reading(&self, item: EquipmentItem) -> EquipmentReading {
        self.equipment.get(item)
    }
}

/// Position in the clearance checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Stage {
    /// Waiting for a person to step in front of the camera.
    #[default]
    Idle,
    Stage1,
    Stage2,
    Stage3,
    /// All equipment checks passed.
    Complete,
}

impl Stage {
    /// Checklist number for the three checking stages.
    pub fn number(self) -> Option<u8> {
        match self {
            Stage::Stage1 => Some(1),
            Stage::Stage2 => Some(2),
            Stage::Stage3 => Some(3),
            Stage::Idle | Stage::Complete => None,
        }
    }

    /// The stage reached after passing this one. `Idle` and `Complete` have
    /// no automatic successor.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Stage1 => Some(Stage::Stage2),
            Stage::Stage2 => Some(Stage::Stage3),
            Stage::Stage3 => Some(Stage::Complete),
            Stage::Idle | Stage::Complete => None,
        }
    }

    pub fn is_checking(self) -> bool {
        self.number().is_some()
    }

    /// Equipment requirements for a checking stage.
    pub fn definition(self) -> Option<&'static StageDefinition> {
        self.number()
            .map(|n| &STAGE_DEFINITIONS[usize::from(n) - 1])
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Idle => "Waiting for person",
            Stage::Complete => "Clearance complete",
            checking => checking.definition().map_or("", |d| d.name),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.number() {
            Some(n) => write!(f, "stage {n} ({})", self.name()),
            None => f.write_str(self.name()),
        }
    }
}

/// Static requirements of one checking stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDefinition {
    pub stage: Stage,
    pub name: &'static str,
    /// Both items must pass to clear the stage.
    pub items: [EquipmentItem; 2],
}

pub static STAGE_DEFINITIONS: [StageDefinition; 3] = [
    StageDefinition {
        stage: Stage::Stage1,
        name: "Head protection",
        items: [EquipmentItem::Helmet, EquipmentItem::Goggles],
    },
    StageDefinition {
        stage: Stage::Stage2,
        name: "Hand and foot protection",
        items: [EquipmentItem::Gloves, EquipmentItem::Boots],
    },
    StageDefinition {
        stage: Stage::Stage3,
        name: "Body protection",
        items: [EquipmentItem::Suit, EquipmentItem::Mask],
    },
];

/// Severity attached to every event-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Success => write!(f, "SUCCESS"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// One entry handed to the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
}

impl LogEvent {
    pub fn new(severity: Severity, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            severity,
            message: message.into(),
        }
    }
}

/// Errors surfaced at the boundaries of the clearance core.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClearanceError {
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Status source unavailable: {0}")]
    SourceUnavailable(String),
}
