//! Core traits and types for cached entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Trait for domain objects the dispatcher can read, write and cache.
///
/// Serialization is not part of this trait: it comes from the codec
/// registered for the type in the [`TypeRegistry`](crate::TypeRegistry).
pub trait Entity: Clone + Send + Sync + 'static {
  /// Unique identifier for this entity (e.g. a todo id).
  fn entity_id(&self) -> String;

  /// Entity type name for storage organization (e.g. "todo", "user").
  fn entity_type() -> &'static str;
}

/// A single cached record, as held by the local cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRecord {
  /// Entity type the record belongs to
  pub entity_type: String,
  /// Identifier of the entity within its type
  pub id: String,
  /// Serialized entity
  pub payload: Value,
  /// When the record was last written
  pub cached_at: DateTime<Utc>,
}
