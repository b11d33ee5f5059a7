//! Local cache of entity payloads, one collection per entity type.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::storage::DocumentStore;
use super::traits::CachedRecord;
use crate::error::{StorageError, StorageResult};

/// Per-type cache of entity payloads, keyed by entity identifier.
///
/// All operations are local and never touch the network.
pub struct LocalCache<S: DocumentStore> {
  storage: Arc<S>,
}

impl<S: DocumentStore> LocalCache<S> {
  /// Create a new cache over the given storage backend.
  pub fn new(storage: Arc<S>) -> Self {
    Self { storage }
  }

  /// Insert or overwrite the record for `id`.
  pub fn upsert_one(&self, entity_type: &str, id: &str, payload: Value) -> StorageResult<()> {
    let record = CachedRecord {
      entity_type: entity_type.to_string(),
      id: id.to_string(),
      payload,
      cached_at: Utc::now(),
    };
    self
      .storage
      .put(&collection(entity_type), id, &serde_json::to_value(&record)?)
  }

  /// Replace the full cached set for `entity_type` with `records`.
  ///
  /// This is not a merge: records absent from `records` are dropped.
  pub fn upsert_many(&self, entity_type: &str, records: Vec<(String, Value)>) -> StorageResult<()> {
    let cached_at = Utc::now();
    let documents = records
      .into_iter()
      .map(|(id, payload)| {
        let record = CachedRecord {
          entity_type: entity_type.to_string(),
          id: id.clone(),
          payload,
          cached_at,
        };
        Ok((id, serde_json::to_value(&record)?))
      })
      .collect::<StorageResult<Vec<_>>>()?;

    debug!(entity_type, count = documents.len(), "replacing cached set");
    self.storage.replace(&collection(entity_type), &documents)
  }

  /// Remove the record for `id`. Returns whether a record was removed.
  pub fn delete(&self, entity_type: &str, id: &str) -> StorageResult<bool> {
    self.storage.delete(&collection(entity_type), id)
  }

  /// Every cached record of `entity_type`, in insertion order.
  pub fn list_all(&self, entity_type: &str) -> StorageResult<Vec<CachedRecord>> {
    self
      .storage
      .list(&collection(entity_type))?
      .into_iter()
      .map(|(_, document)| decode_record(document))
      .collect()
  }

  /// The first cached record of `entity_type`, if any.
  pub fn get_first(&self, entity_type: &str) -> StorageResult<Option<CachedRecord>> {
    Ok(self.list_all(entity_type)?.into_iter().next())
  }

  /// The cached record for `id`, if any.
  pub fn get(&self, entity_type: &str, id: &str) -> StorageResult<Option<CachedRecord>> {
    self
      .storage
      .get(&collection(entity_type), id)?
      .map(decode_record)
      .transpose()
  }
}

impl<S: DocumentStore> Clone for LocalCache<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
    }
  }
}

fn collection(entity_type: &str) -> String {
  format!("entity:{}", entity_type)
}

fn decode_record(document: Value) -> StorageResult<CachedRecord> {
  serde_json::from_value(document)
    .map_err(|e| StorageError::InvalidData(format!("malformed cached record: {}", e)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::MemoryStore;
  use serde_json::json;

  fn cache() -> LocalCache<MemoryStore> {
    LocalCache::new(Arc::new(MemoryStore::new()))
  }

  #[test]
  fn test_upsert_one_overwrites_by_id() {
    let cache = cache();
    cache.upsert_one("todo", "1", json!({"id": 1, "title": "a"})).unwrap();
    cache.upsert_one("todo", "1", json!({"id": 1, "title": "b"})).unwrap();

    let all = cache.list_all("todo").unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].payload["title"], "b");
    assert_eq!(all[0].entity_type, "todo");
  }

  #[test]
  fn test_upsert_many_replaces_not_merges() {
    let cache = cache();
    cache.upsert_one("todo", "1", json!({"id": 1})).unwrap();
    cache
      .upsert_many(
        "todo",
        vec![
          ("2".to_string(), json!({"id": 2})),
          ("3".to_string(), json!({"id": 3})),
        ],
      )
      .unwrap();

    let ids: Vec<String> = cache
      .list_all("todo")
      .unwrap()
      .into_iter()
      .map(|r| r.id)
      .collect();
    assert_eq!(ids, vec!["2", "3"]);
    assert!(cache.get("todo", "1").unwrap().is_none());
  }

  #[test]
  fn test_get_first_and_delete() {
    let cache = cache();
    assert!(cache.get_first("todo").unwrap().is_none());

    cache.upsert_one("todo", "1", json!({"id": 1})).unwrap();
    cache.upsert_one("todo", "2", json!({"id": 2})).unwrap();
    assert_eq!(cache.get_first("todo").unwrap().unwrap().id, "1");

    assert!(cache.delete("todo", "1").unwrap());
    assert_eq!(cache.get_first("todo").unwrap().unwrap().id, "2");
  }

  #[test]
  fn test_types_do_not_share_records() {
    let cache = cache();
    cache.upsert_one("todo", "1", json!({"id": 1})).unwrap();
    assert!(cache.get("user", "1").unwrap().is_none());
  }
}
