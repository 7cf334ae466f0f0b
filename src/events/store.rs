//! Event persistence.

use super::event::{DetectionEvent, EventType, TIMESTAMP_FORMAT};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by an event store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("corrupt event row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only sink of detection events.
///
/// Stores keep every appended event in insertion order; they never
/// reorder or de-duplicate.
pub trait EventStore {
    /// Appends an event.
    fn append(&mut self, event: &DetectionEvent) -> Result<(), StoreError>;

    /// Returns every event, most recent first.
    fn list_all(&self) -> Result<Vec<DetectionEvent>, StoreError>;
}

impl<S: EventStore + ?Sized> EventStore for Box<S> {
    fn append(&mut self, event: &DetectionEvent) -> Result<(), StoreError> {
        (**self).append(event)
    }

    fn list_all(&self) -> Result<Vec<DetectionEvent>, StoreError> {
        (**self).list_all()
    }
}

/// SQLite-backed event store.
pub struct SqliteEventStore {
    conn: Connection,
}

impl SqliteEventStore {
    /// Opens (creating if needed) the database file and its table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        let store = Self { conn };
        store.migrate()?;
        tracing::debug!(path = %path.as_ref().display(), "Event store opened");
        Ok(store)
    }

    /// Opens a private in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS detection_events (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp   TEXT,
                event_type  TEXT,
                confidence  REAL,
                clip_path   TEXT
            );
            ",
        )?;
        Ok(())
    }

    /// Number of stored events.
    pub fn count(&self) -> Result<u64, StoreError> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM detection_events", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

struct EventRow {
    id: i64,
    timestamp: String,
    event_type: String,
    confidence: Option<f64>,
    clip_path: Option<String>,
}

impl EventRow {
    fn into_event(self) -> Result<DetectionEvent, StoreError> {
        let id = self.id;
        let corrupt = move |reason: String| StoreError::Corrupt { id, reason };

        let timestamp = NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT)
            .map_err(|e| corrupt(format!("timestamp {:?}: {}", self.timestamp, e)))?;
        let event_type = self.event_type.parse::<EventType>().map_err(corrupt)?;

        Ok(DetectionEvent {
            timestamp,
            event_type,
            confidence: self.confidence.map(|c| c as f32),
            clip_path: self.clip_path.map(PathBuf::from),
        })
    }
}

impl EventStore for SqliteEventStore {
    fn append(&mut self, event: &DetectionEvent) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO detection_events (timestamp, event_type, confidence, clip_path)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                event.timestamp_text(),
                event.event_type.as_str(),
                event.confidence.map(f64::from),
                event.clip_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
            ],
        )?;
        tracing::debug!(
            event_type = %event.event_type,
            timestamp = %event.timestamp_text(),
            "Event inserted"
        );
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<DetectionEvent>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, event_type, confidence, clip_path
             FROM detection_events
             ORDER BY timestamp DESC, id DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(EventRow {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                event_type: row.get(2)?,
                confidence: row.get(3)?,
                clip_path: row.get(4)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?.into_event()?);
        }
        Ok(out)
    }
}

/// In-process store, used for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: Vec<DetectionEvent>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events in insertion order.
    pub fn events(&self) -> &[DetectionEvent] {
        &self.events
    }
}

impl EventStore for MemoryEventStore {
    fn append(&mut self, event: &DetectionEvent) -> Result<(), StoreError> {
        self.events.push(event.clone());
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<DetectionEvent>, StoreError> {
        Ok(self.events.iter().rev().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, s)
            .unwrap()
    }

    #[test]
    fn test_sqlite_round_trip_most_recent_first() {
        let mut store = SqliteEventStore::in_memory().unwrap();
        store.append(&DetectionEvent::tamper(at(1))).unwrap();
        store.append(&DetectionEvent::object(at(2), Some(0.5))).unwrap();
        store
            .append(&DetectionEvent::motion(at(3), "recordings/clip_20240501_120001.mjpeg"))
            .unwrap();

        let events = store.list_all().unwrap();
        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(events[0].event_type, EventType::Motion);
        assert_eq!(
            events[0].clip_path.as_deref(),
            Some(Path::new("recordings/clip_20240501_120001.mjpeg"))
        );
        assert_eq!(events[1].confidence, Some(0.5));
        assert_eq!(events[2], DetectionEvent::tamper(at(1)));
    }

    #[test]
    fn test_same_second_keeps_insertion_order() {
        let mut store = SqliteEventStore::in_memory().unwrap();
        store.append(&DetectionEvent::tamper(at(5))).unwrap();
        store.append(&DetectionEvent::object(at(5), Some(0.9))).unwrap();

        let events = store.list_all().unwrap();
        assert_eq!(events[0].event_type, EventType::Object);
        assert_eq!(events[1].event_type, EventType::Tamper);
    }

    #[test]
    fn test_store_does_not_deduplicate() {
        let mut store = SqliteEventStore::in_memory().unwrap();
        let event = DetectionEvent::tamper(at(5));
        store.append(&event).unwrap();
        store.append(&event).unwrap();

        assert_eq!(store.list_all().unwrap().len(), 2);
    }

    #[test]
    fn test_file_store_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");

        {
            let mut store = SqliteEventStore::open(&path).unwrap();
            store.append(&DetectionEvent::tamper(at(1))).unwrap();
        }

        let store = SqliteEventStore::open(&path).unwrap();
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_memory_store_reverse_order() {
        let mut store = MemoryEventStore::new();
        store.append(&DetectionEvent::tamper(at(1))).unwrap();
        store.append(&DetectionEvent::tamper(at(2))).unwrap();

        let events = store.list_all().unwrap();
        assert_eq!(events[0].timestamp, at(2));
        assert_eq!(store.events()[0].timestamp, at(1));
    }
}
