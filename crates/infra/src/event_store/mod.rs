//! Append-only event store boundary.
//!
//! Product class streams live here; join records are plain rows and do not
//! go through the event store.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
