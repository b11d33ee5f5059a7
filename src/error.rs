//! Error types for the dispatch layer.

use thiserror::Error;

/// Result type for dispatcher operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors a caller can see from the dispatcher.
///
/// Transport failures are not part of this enum: they are absorbed into a
/// degraded [`ApiResult`](crate::ApiResult) instead.
#[derive(Debug, Error)]
pub enum Error {
  /// The entity type was never registered with the [`TypeRegistry`](crate::TypeRegistry).
  #[error("entity type not registered: {type_name}")]
  UnregisteredType { type_name: &'static str },

  /// The local store failed. The offline guarantee no longer holds.
  #[error("storage failure: {0}")]
  Storage(#[from] StorageError),

  /// A submitted entity could not be encoded by its registered codec.
  #[error("codec error: {0}")]
  Codec(#[from] CodecError),
}

/// Errors raised by a [`DocumentStore`](crate::cache::DocumentStore).
#[derive(Debug, Error)]
pub enum StorageError {
  /// Database error from SQLite.
  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  /// Stored document could not be (de)serialized.
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// IO error (file system).
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  /// A lock guarding the store was poisoned by a panicking writer.
  #[error("lock poisoned: {0}")]
  Poisoned(String),

  /// Stored data is not what this crate wrote.
  #[error("invalid data: {0}")]
  InvalidData(String),
}

/// Errors raised by a registered entity codec.
#[derive(Debug, Error)]
#[error("{type_name}: {message}")]
pub struct CodecError {
  pub type_name: &'static str,
  pub message: String,
}

impl CodecError {
  pub fn new(type_name: &'static str, message: impl Into<String>) -> Self {
    Self {
      type_name,
      message: message.into(),
    }
  }
}
