//! Health record model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::Timestamp;

/// Kind-specific attributes of a record. Shape is decided by the record kind
/// and is not validated here.
pub type RecordData = Map<String, Value>;

/// Identifier assigned by the remote store when a record is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discriminator for the kind of observation a record holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordKind {
    Glucose,
    Meal,
    Activity,
    Medication,
    BloodPressure,
    /// A kind this build does not know about, kept verbatim.
    Other(String),
}

impl RecordKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Glucose => "Glucosa",
            Self::Meal => "Alimentación",
            Self::Activity => "Actividad",
            Self::Medication => "Medicación",
            Self::BloodPressure => "Presión arterial",
            Self::Other(kind) => kind,
        }
    }

    /// Parse a kind from its stored label or a short English alias.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_lowercase().as_str() {
            "glucosa" | "glucose" => Self::Glucose,
            "alimentación" | "alimentacion" | "meal" | "food" => Self::Meal,
            "actividad" | "activity" => Self::Activity,
            "medicación" | "medicacion" | "medication" => Self::Medication,
            "presión arterial" | "presion arterial" | "blood-pressure" | "bp" => {
                Self::BloodPressure
            }
            _ => Self::Other(trimmed.to_string()),
        }
    }
}

impl From<String> for RecordKind {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<RecordKind> for String {
    fn from(value: RecordKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    /// Absent until the remote store has created the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    /// When the observation happened; stamped with "now" on create if absent
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "ts")]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub data: RecordData,
}

impl HealthRecord {
    #[must_use]
    pub fn new(kind: RecordKind) -> Self {
        Self {
            id: None,
            kind,
            timestamp: None,
            notes: String::new(),
            data: RecordData::new(),
        }
    }

    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Moment of day ("Antes de comer", ...), shared by glucose and blood
    /// pressure readings.
    #[must_use]
    pub fn moment(&self) -> Option<&str> {
        self.data.get("moment").and_then(Value::as_str)
    }

    /// Symptoms are stored as one comma-separated string.
    #[must_use]
    pub fn symptoms(&self) -> Vec<String> {
        self.data
            .get("symptoms")
            .and_then(Value::as_str)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|symptom| !symptom.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Partial update for a record. Supplied fields replace the stored ones;
/// `data` is merged key by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<RecordKind>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "ts")]
    pub timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<RecordData>,
}

impl RecordPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.kind.is_none() && self.timestamp.is_none() && self.notes.is_none() && self.data.is_none()
    }

    pub fn apply_to(&self, record: &mut HealthRecord) {
        if let Some(kind) = &self.kind {
            record.kind = kind.clone();
        }
        if let Some(timestamp) = self.timestamp {
            record.timestamp = Some(timestamp);
        }
        if let Some(notes) = &self.notes {
            record.notes.clone_from(notes);
        }
        if let Some(data) = &self.data {
            for (key, value) in data {
                record.data.insert(key.clone(), value.clone());
            }
        }
    }
}
