//! Persisted FIFO log of mutations the network has not confirmed yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::storage::DocumentStore;
use crate::error::{StorageError, StorageResult};

/// Collection the queue lives in, next to the entity collections.
const QUEUE_COLLECTION: &str = "__pending";

/// Kind of mutation a queued operation replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mutation {
  Create,
  Update,
  Delete,
}

/// A mutation waiting to be replayed against the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
  /// Position in the log. Strictly increasing while operations are queued;
  /// numbering starts over once a fully drained queue is reopened.
  pub sequence: u64,
  pub mutation: Mutation,
  pub url: String,
  pub query: Vec<(String, String)>,
  pub entity_type: String,
  pub entity_id: String,
  /// Submitted entity, serialized with its registered codec
  pub payload: Value,
  pub enqueued_at: DateTime<Utc>,
}

/// Everything needed to queue an operation; the queue assigns the rest.
#[derive(Debug, Clone)]
pub struct OperationDraft {
  pub mutation: Mutation,
  pub url: String,
  pub query: Vec<(String, String)>,
  pub entity_type: String,
  pub entity_id: String,
  pub payload: Value,
}

/// Ordered log of pending operations.
///
/// Operations are kept in creation order. Duplicates for the same entity are
/// not collapsed: the log is replayed exactly as it was written.
pub struct PendingQueue<S: DocumentStore> {
  storage: Arc<S>,
  /// Next sequence to assign. Held until the entry is persisted, so an
  /// entry never becomes visible before every lower sequence.
  next_sequence: Mutex<u64>,
}

impl<S: DocumentStore> PendingQueue<S> {
  /// Open the queue, continuing numbering after the highest persisted entry.
  pub fn open(storage: Arc<S>) -> StorageResult<Self> {
    let queue = Self {
      storage,
      next_sequence: Mutex::new(0),
    };
    let next = queue
      .list()?
      .last()
      .map(|op| op.sequence + 1)
      .unwrap_or(0);
    *queue.lock_sequence()? = next;

    Ok(queue)
  }

  /// Append an operation after the current tail.
  pub fn append(&self, draft: OperationDraft) -> StorageResult<PendingOperation> {
    let mut next_sequence = self.lock_sequence()?;
    let sequence = *next_sequence;
    let operation = PendingOperation {
      sequence,
      mutation: draft.mutation,
      url: draft.url,
      query: draft.query,
      entity_type: draft.entity_type,
      entity_id: draft.entity_id,
      payload: draft.payload,
      enqueued_at: Utc::now(),
    };

    self.storage.put(
      QUEUE_COLLECTION,
      &sequence_key(sequence),
      &serde_json::to_value(&operation)?,
    )?;
    *next_sequence += 1;
    drop(next_sequence);

    debug!(
      sequence,
      mutation = ?operation.mutation,
      url = %operation.url,
      "queued pending operation"
    );
    Ok(operation)
  }

  /// All pending operations in FIFO order.
  pub fn list(&self) -> StorageResult<Vec<PendingOperation>> {
    let mut operations = self
      .storage
      .list(QUEUE_COLLECTION)?
      .into_iter()
      .map(|(_, document)| {
        serde_json::from_value::<PendingOperation>(document)
          .map_err(|e| StorageError::InvalidData(format!("malformed pending operation: {}", e)))
      })
      .collect::<StorageResult<Vec<_>>>()?;

    operations.sort_by_key(|op| op.sequence);
    Ok(operations)
  }

  /// The oldest pending operation, if any.
  pub fn head(&self) -> StorageResult<Option<PendingOperation>> {
    Ok(self.list()?.into_iter().next())
  }

  /// Remove a replayed operation. Returns whether it was still queued.
  pub fn remove(&self, sequence: u64) -> StorageResult<bool> {
    self.storage.delete(QUEUE_COLLECTION, &sequence_key(sequence))
  }

  pub fn len(&self) -> StorageResult<usize> {
    Ok(self.storage.list(QUEUE_COLLECTION)?.len())
  }

  pub fn is_empty(&self) -> StorageResult<bool> {
    Ok(self.len()? == 0)
  }

  fn lock_sequence(&self) -> StorageResult<MutexGuard<'_, u64>> {
    self
      .next_sequence
      .lock()
      .map_err(|e| StorageError::Poisoned(e.to_string()))
  }
}

/// Zero padded so lexical order matches numeric order.
fn sequence_key(sequence: u64) -> String {
  format!("{:020}", sequence)
}
