//! Offline-first data access.
//!
//! Application code issues typed reads and writes through an
//! [`OfflineClient`]. Each call goes to the network when it can and to a
//! local cache when it cannot; writes that the network did not confirm are
//! kept in a persisted queue and replayed, in order, when connectivity
//! returns.
//!
//! ```ignore
//! let mut registry = TypeRegistry::new();
//! registry.register_serde::<Todo>();
//!
//! let (feed, monitor) = connectivity::channel(false);
//! let client = OfflineClient::new(registry, transport, SqliteStore::open(&path)?, monitor)?;
//!
//! // Queued and cached locally while offline
//! let result = client.post("/todos", &todo, &[]).await?;
//! assert!(result.is_degraded());
//!
//! // Replays the queue
//! feed.set(true);
//! ```

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod registry;
pub mod remote;

#[cfg(test)]
mod test_support;

pub use cache::{Entity, MemoryStore, SqliteStore};
pub use error::{Error, Result};
pub use registry::TypeRegistry;
pub use remote::{ApiResult, HttpTransport, OfflineClient, Source, Transport};
