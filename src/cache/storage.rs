//! Document store trait and its SQLite and in-memory implementations.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{StorageError, StorageResult};

/// Trait for storage backends.
///
/// A store holds JSON documents addressed by (collection, id). Backends are
/// expected to be durable across process restarts; `list` returns documents
/// in insertion order, and overwriting a document keeps its position.
pub trait DocumentStore: Send + Sync {
  /// Get a single document.
  fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Value>>;

  /// List every document in a collection, in insertion order.
  fn list(&self, collection: &str) -> StorageResult<Vec<(String, Value)>>;

  /// Insert or overwrite a document.
  fn put(&self, collection: &str, id: &str, document: &Value) -> StorageResult<()>;

  /// Delete a document. Returns whether it existed.
  fn delete(&self, collection: &str, id: &str) -> StorageResult<bool>;

  /// Replace the whole collection with the given documents.
  fn replace(&self, collection: &str, documents: &[(String, Value)]) -> StorageResult<()>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for std::sync::Arc<S> {
  fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Value>> {
    (**self).get(collection, id)
  }

  fn list(&self, collection: &str) -> StorageResult<Vec<(String, Value)>> {
    (**self).list(collection)
  }

  fn put(&self, collection: &str, id: &str, document: &Value) -> StorageResult<()> {
    (**self).put(collection, id, document)
  }

  fn delete(&self, collection: &str, id: &str) -> StorageResult<bool> {
    (**self).delete(collection, id)
  }

  fn replace(&self, collection: &str, documents: &[(String, Value)]) -> StorageResult<()> {
    (**self).replace(collection, documents)
  }
}

/// Process-local store. Nothing survives a restart.
///
/// Used for tests and for the `--ephemeral` command line mode.
#[derive(Default)]
pub struct MemoryStore {
  collections: Mutex<HashMap<String, Vec<(String, Value)>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> StorageResult<MutexGuard<'_, HashMap<String, Vec<(String, Value)>>>> {
    self
      .collections
      .lock()
      .map_err(|e| StorageError::Poisoned(e.to_string()))
  }
}

impl DocumentStore for MemoryStore {
  fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Value>> {
    let collections = self.lock()?;
    Ok(
      collections
        .get(collection)
        .and_then(|docs| docs.iter().find(|(key, _)| key == id))
        .map(|(_, doc)| doc.clone()),
    )
  }

  fn list(&self, collection: &str) -> StorageResult<Vec<(String, Value)>> {
    let collections = self.lock()?;
    Ok(collections.get(collection).cloned().unwrap_or_default())
  }

  fn put(&self, collection: &str, id: &str, document: &Value) -> StorageResult<()> {
    let mut collections = self.lock()?;
    let docs = collections.entry(collection.to_string()).or_default();
    match docs.iter_mut().find(|(key, _)| key == id) {
      Some((_, existing)) => *existing = document.clone(),
      None => docs.push((id.to_string(), document.clone())),
    }
    Ok(())
  }

  fn delete(&self, collection: &str, id: &str) -> StorageResult<bool> {
    let mut collections = self.lock()?;
    let Some(docs) = collections.get_mut(collection) else {
      return Ok(false);
    };
    let before = docs.len();
    docs.retain(|(key, _)| key != id);
    Ok(docs.len() != before)
  }

  fn replace(&self, collection: &str, documents: &[(String, Value)]) -> StorageResult<()> {
    let mut collections = self.lock()?;
    let mut docs: Vec<(String, Value)> = Vec::with_capacity(documents.len());
    // Repeated ids collapse onto the first position, last document wins
    for (id, document) in documents {
      match docs.iter_mut().find(|(key, _)| key == id) {
        Some((_, existing)) => *existing = document.clone(),
        None => docs.push((id.clone(), document.clone())),
      }
    }
    collections.insert(collection.to_string(), docs);
    Ok(())
  }
}

/// SQLite-based document store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open (or create) a store at the given path.
  pub fn open(path: &Path) -> StorageResult<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    Self::with_connection(conn)
  }

  /// Open a store that lives only as long as this value.
  pub fn open_in_memory() -> StorageResult<Self> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> StorageResult<Self> {
    conn.execute_batch(STORE_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| StorageError::Poisoned(e.to_string()))
  }
}

/// Schema for the document table.
const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data BLOB NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (collection, id)
);
"#;

const UPSERT_DOCUMENT: &str = "INSERT INTO documents (collection, id, data, updated_at)
     VALUES (?1, ?2, ?3, datetime('now'))
     ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at";

impl DocumentStore for SqliteStore {
  fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Value>> {
    let conn = self.conn()?;

    let data: Option<Vec<u8>> = conn
      .query_row(
        "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
        params![collection, id],
        |row| row.get(0),
      )
      .optional()?;

    match data {
      Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
      None => Ok(None),
    }
  }

  fn list(&self, collection: &str) -> StorageResult<Vec<(String, Value)>> {
    let conn = self.conn()?;

    let mut stmt =
      conn.prepare("SELECT id, data FROM documents WHERE collection = ?1 ORDER BY rowid")?;

    let rows = stmt.query_map(params![collection], |row| {
      let id: String = row.get(0)?;
      let data: Vec<u8> = row.get(1)?;
      Ok((id, data))
    })?;

    let mut documents = Vec::new();
    for row in rows {
      let (id, data) = row?;
      documents.push((id, serde_json::from_slice(&data)?));
    }

    Ok(documents)
  }

  fn put(&self, collection: &str, id: &str, document: &Value) -> StorageResult<()> {
    let conn = self.conn()?;
    let data = serde_json::to_vec(document)?;

    conn.execute(UPSERT_DOCUMENT, params![collection, id, data])?;

    Ok(())
  }

  fn delete(&self, collection: &str, id: &str) -> StorageResult<bool> {
    let conn = self.conn()?;

    let removed = conn.execute(
      "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
      params![collection, id],
    )?;

    Ok(removed > 0)
  }

  fn replace(&self, collection: &str, documents: &[(String, Value)]) -> StorageResult<()> {
    let mut conn = self.conn()?;
    let tx = conn.transaction()?;

    tx.execute(
      "DELETE FROM documents WHERE collection = ?1",
      params![collection],
    )?;

    for (id, document) in documents {
      let data = serde_json::to_vec(document)?;
      tx.execute(UPSERT_DOCUMENT, params![collection, id, data])?;
    }

    tx.commit()?;

    Ok(())
  }
}
