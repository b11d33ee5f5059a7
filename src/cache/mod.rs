//! Local persistence for offline operation.
//!
//! This module provides the storage side of the dispatcher:
//! - A document store abstraction with SQLite and in-memory backends
//! - A per-type entity cache that mirrors the client's intended state
//! - A persisted FIFO queue of mutations awaiting replay

mod layer;
mod queue;
mod storage;
mod traits;

pub use layer::LocalCache;
pub use queue::{Mutation, OperationDraft, PendingOperation, PendingQueue};
pub use storage::{DocumentStore, MemoryStore, SqliteStore};
pub use traits::{CachedRecord, Entity};
