//! Detection events, their persistence, and edge-triggered emission.

mod dedup;
mod event;
mod store;

pub use dedup::EventDeduplicator;
pub use event::{DetectionEvent, EventType, TIMESTAMP_FORMAT};
pub use store::{EventStore, MemoryEventStore, SqliteEventStore, StoreError};
