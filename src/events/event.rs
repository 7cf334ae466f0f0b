//! Detection event records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Text layout of persisted timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Signal class of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// A recording session concluded.
    Motion,
    /// The lens appears obstructed.
    Tamper,
    /// The object detector reported a confident hit.
    Object,
}

impl EventType {
    /// Returns the persisted name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Motion => "motion",
            EventType::Tamper => "tamper",
            EventType::Object => "object",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "motion" => Ok(EventType::Motion),
            "tamper" => Ok(EventType::Tamper),
            "object" => Ok(EventType::Object),
            other => Err(format!("unknown event type: {other}")),
        }
    }
}

/// An immutable detection record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub timestamp: NaiveDateTime,
    pub event_type: EventType,
    pub confidence: Option<f32>,
    pub clip_path: Option<PathBuf>,
}

impl DetectionEvent {
    /// A concluded recording session.
    pub fn motion(timestamp: NaiveDateTime, clip_path: impl Into<PathBuf>) -> Self {
        Self {
            timestamp: truncate(timestamp),
            event_type: EventType::Motion,
            confidence: None,
            clip_path: Some(clip_path.into()),
        }
    }

    /// Start of an obstruction.
    pub fn tamper(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp: truncate(timestamp),
            event_type: EventType::Tamper,
            confidence: None,
            clip_path: None,
        }
    }

    /// Start of an object sighting.
    pub fn object(timestamp: NaiveDateTime, confidence: Option<f32>) -> Self {
        Self {
            timestamp: truncate(timestamp),
            event_type: EventType::Object,
            confidence,
            clip_path: None,
        }
    }

    /// Timestamp rendered as persisted.
    pub fn timestamp_text(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

impl fmt::Display for DetectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:<6}", self.timestamp_text(), self.event_type)?;
        if let Some(confidence) = self.confidence {
            write!(f, " confidence={confidence:.2}")?;
        }
        if let Some(clip) = &self.clip_path {
            write!(f, " clip={}", clip.display())?;
        }
        Ok(())
    }
}

/// Drops sub-second precision so records equal their persisted form.
fn truncate(timestamp: NaiveDateTime) -> NaiveDateTime {
    use chrono::Timelike;
    timestamp.with_nanosecond(0).unwrap_or(timestamp)
}
