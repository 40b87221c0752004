//! Append-only event streams with optimistic concurrency.
//!
//! Each aggregate owns one stream. Appends carry the version the writer last
//! read; the store commits only if the stream is still at that version, which
//! is the compare-and-swap every order command goes through.

pub mod error;
pub mod event;
pub mod memory;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventId, EventRecord, EventRecordBuilder, Version};
pub use memory::InMemoryEventStore;
pub use store::{EventStore, EventStream, ExpectedVersion};
