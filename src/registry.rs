//! Type registry mapping entity types to their payload codecs.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::Entity;
use crate::error::CodecError;

type ToPayloadFn<T> = dyn Fn(&T) -> Result<Value, CodecError> + Send + Sync;
type FromPayloadFn<T> = dyn Fn(Value) -> Result<T, CodecError> + Send + Sync;

/// Serialize/deserialize pair registered for one entity type.
pub struct Codec<T> {
  to_payload: Arc<ToPayloadFn<T>>,
  from_payload: Arc<FromPayloadFn<T>>,
}

impl<T> Codec<T> {
  pub fn to_payload(&self, entity: &T) -> Result<Value, CodecError> {
    (self.to_payload)(entity)
  }

  pub fn from_payload(&self, payload: Value) -> Result<T, CodecError> {
    (self.from_payload)(payload)
  }
}

impl<T> Clone for Codec<T> {
  fn clone(&self) -> Self {
    Self {
      to_payload: Arc::clone(&self.to_payload),
      from_payload: Arc::clone(&self.from_payload),
    }
  }
}

/// Maps each entity type to exactly one [`Codec`].
///
/// Entries are keyed by `TypeId`, so a lookup can only ever return the codec
/// registered for that exact type.
#[derive(Default)]
pub struct TypeRegistry {
  entries: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl TypeRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a codec for `T`. Registering the same type again replaces the
  /// previous codec.
  pub fn register<T, F, G>(&mut self, to_payload: F, from_payload: G) -> &mut Self
  where
    T: Entity,
    F: Fn(&T) -> Result<Value, CodecError> + Send + Sync + 'static,
    G: Fn(Value) -> Result<T, CodecError> + Send + Sync + 'static,
  {
    let codec = Codec::<T> {
      to_payload: Arc::new(to_payload),
      from_payload: Arc::new(from_payload),
    };
    self.entries.insert(TypeId::of::<T>(), Box::new(codec));
    self
  }

  /// Register the serde_json codec for `T`.
  pub fn register_serde<T>(&mut self) -> &mut Self
  where
    T: Entity + Serialize + DeserializeOwned,
  {
    self.register::<T, _, _>(
      |entity| {
        serde_json::to_value(entity).map_err(|e| CodecError::new(T::entity_type(), e.to_string()))
      },
      |payload| {
        serde_json::from_value(payload).map_err(|e| CodecError::new(T::entity_type(), e.to_string()))
      },
    )
  }

  /// Codec registered for `T`, if any.
  pub fn lookup<T: Entity>(&self) -> Option<Codec<T>> {
    self
      .entries
      .get(&TypeId::of::<T>())
      .and_then(|entry| entry.downcast_ref::<Codec<T>>())
      .cloned()
  }

  pub fn contains<T: Entity>(&self) -> bool {
    self.entries.contains_key(&TypeId::of::<T>())
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
