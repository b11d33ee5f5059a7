//! Offline-first client that decides, per call, between network and cache.

use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::replay::{DrainOutcome, ReplayState, Replayer};
use super::response::{ApiResult, MSG_NO_CONNECTIVITY, MSG_NO_DATA, STATUS_OK};
use super::transport::{Method, Request, Transport, TransportError};
use crate::cache::{
  CachedRecord, DocumentStore, Entity, LocalCache, Mutation, OperationDraft, PendingOperation,
  PendingQueue,
};
use crate::connectivity::ConnectivityMonitor;
use crate::error::{Error, Result};
use crate::registry::{Codec, TypeRegistry};

/// Offline-first client over a transport and a local store.
///
/// Reads go to the network when connected and fall back to the cache.
/// Mutations go to the network when connected; when they cannot, they are
/// queued for replay and applied to the cache right away. Network failures
/// never surface as errors, only as degraded results.
///
/// Must be created inside a Tokio runtime: it spawns the task that replays
/// the queue whenever connectivity comes back. Dropping the client stops it.
pub struct OfflineClient<T: Transport, S: DocumentStore + 'static> {
  registry: TypeRegistry,
  transport: Arc<T>,
  cache: LocalCache<S>,
  queue: Arc<PendingQueue<S>>,
  monitor: ConnectivityMonitor,
  replayer: Arc<Replayer<T, S>>,
  replay_task: JoinHandle<()>,
}

impl<T: Transport, S: DocumentStore + 'static> OfflineClient<T, S> {
  /// Create a client and subscribe its replayer to `monitor`.
  pub fn new(
    registry: TypeRegistry,
    transport: T,
    storage: S,
    monitor: ConnectivityMonitor,
  ) -> Result<Self> {
    let storage = Arc::new(storage);
    let transport = Arc::new(transport);
    let queue = Arc::new(PendingQueue::open(Arc::clone(&storage))?);
    let cache = LocalCache::new(storage);

    let replayer = Arc::new(Replayer::new(Arc::clone(&transport), Arc::clone(&queue)));
    let replay_task = Arc::clone(&replayer).spawn(monitor.clone());

    Ok(Self {
      registry,
      transport,
      cache,
      queue,
      monitor,
      replayer,
      replay_task,
    })
  }

  /// Read a single entity.
  ///
  /// Offline (or when the network read fails) this serves the first cached
  /// record of the type.
  pub async fn get<E: Entity>(&self, url: &str, query: &[(&str, &str)]) -> Result<ApiResult<E>> {
    let codec = self.codec::<E>()?;
    let request = Request::new(Method::Get, url, query);

    if let Some(result) = self.read_one(&codec, &request).await? {
      return Ok(result);
    }

    let cached = self.cache.get_first(E::entity_type())?;
    self.serve_one(&codec, cached, request)
  }

  /// Read the entity with identifier `id`.
  ///
  /// Same contract as [`get`](Self::get), but the cache fallback is keyed on
  /// `id` instead of taking the first record.
  pub async fn get_by_id<E: Entity>(
    &self,
    url: &str,
    id: &str,
    query: &[(&str, &str)],
  ) -> Result<ApiResult<E>> {
    let codec = self.codec::<E>()?;
    let request = Request::new(Method::Get, url, query);

    if let Some(result) = self.read_one(&codec, &request).await? {
      return Ok(result);
    }

    let cached = self.cache.get(E::entity_type(), id)?;
    self.serve_one(&codec, cached, request)
  }

  /// Read a list of entities. A successful network read replaces the whole
  /// cached set for the type.
  pub async fn get_list<E: Entity>(
    &self,
    url: &str,
    query: &[(&str, &str)],
  ) -> Result<ApiResult<Vec<E>>> {
    let codec = self.codec::<E>()?;
    let request = Request::new(Method::Get, url, query);

    if self.monitor.is_connected_now() {
      match self.fetch_list(&codec, &request).await {
        Ok((status, entities, records)) => {
          self.cache.upsert_many(E::entity_type(), records)?;
          return Ok(ApiResult::from_network(Some(entities), status, request));
        }
        Err(e) => warn!(url, error = %e, "network read failed, serving cache"),
      }
    }

    let entities: Vec<E> = self
      .cache
      .list_all(E::entity_type())?
      .into_iter()
      .filter_map(|record| decode_cached(&codec, record))
      .collect();
    let message = entities.is_empty().then(|| MSG_NO_DATA.to_string());

    debug!(url, count = entities.len(), "served list from cache");
    Ok(ApiResult::from_cache(Some(entities), message, request))
  }

  /// Create an entity. The cache keeps the submitted entity, not the echo.
  pub async fn post<E: Entity>(
    &self,
    url: &str,
    entity: &E,
    query: &[(&str, &str)],
  ) -> Result<ApiResult<E>> {
    let codec = self.codec::<E>()?;
    self
      .mutate(&codec, Mutation::Create, url, entity, query)
      .await
  }

  /// Update an entity.
  pub async fn put<E: Entity>(
    &self,
    url: &str,
    entity: &E,
    query: &[(&str, &str)],
  ) -> Result<ApiResult<E>> {
    let codec = self.codec::<E>()?;
    self
      .mutate(&codec, Mutation::Update, url, entity, query)
      .await
  }

  /// Delete an entity.
  pub async fn delete<E: Entity>(
    &self,
    url: &str,
    entity: &E,
    query: &[(&str, &str)],
  ) -> Result<ApiResult<E>> {
    let codec = self.codec::<E>()?;
    self
      .mutate(&codec, Mutation::Delete, url, entity, query)
      .await
  }

  /// [`post`](Self::post) each entity independently.
  pub async fn post_list<E: Entity>(
    &self,
    url: &str,
    entities: &[E],
    query: &[(&str, &str)],
  ) -> Result<ApiResult<Vec<E>>> {
    self
      .mutate_list(Mutation::Create, url, entities, query)
      .await
  }

  /// [`put`](Self::put) each entity independently.
  pub async fn put_list<E: Entity>(
    &self,
    url: &str,
    entities: &[E],
    query: &[(&str, &str)],
  ) -> Result<ApiResult<Vec<E>>> {
    self
      .mutate_list(Mutation::Update, url, entities, query)
      .await
  }

  /// [`delete`](Self::delete) each entity independently.
  pub async fn delete_list<E: Entity>(
    &self,
    url: &str,
    entities: &[E],
    query: &[(&str, &str)],
  ) -> Result<ApiResult<Vec<E>>> {
    self
      .mutate_list(Mutation::Delete, url, entities, query)
      .await
  }

  /// Operations still waiting for the network, oldest first.
  pub fn pending_operations(&self) -> Result<Vec<PendingOperation>> {
    Ok(self.queue.list()?)
  }

  /// Drain the queue now instead of waiting for a connectivity edge.
  pub async fn replay_now(&self) -> Result<DrainOutcome> {
    Ok(self.replayer.drain().await?)
  }

  pub fn replay_state(&self) -> ReplayState {
    self.replayer.state()
  }

  pub fn is_connected(&self) -> bool {
    self.monitor.is_connected_now()
  }

  /// Stop listening for connectivity changes. A drain already running is
  /// left to finish.
  pub fn shutdown(self) {
    self.replay_task.abort();
  }

  fn codec<E: Entity>(&self) -> Result<Codec<E>> {
    self.registry.lookup::<E>().ok_or(Error::UnregisteredType {
      type_name: std::any::type_name::<E>(),
    })
  }

  /// Network half of a single read. `None` means "fall back to the cache".
  async fn read_one<E: Entity>(
    &self,
    codec: &Codec<E>,
    request: &Request,
  ) -> Result<Option<ApiResult<E>>> {
    if !self.monitor.is_connected_now() {
      return Ok(None);
    }

    match self.fetch_one(codec, request).await {
      Ok((status, entity, payload)) => {
        self
          .cache
          .upsert_one(E::entity_type(), &entity.entity_id(), payload)?;
        Ok(Some(ApiResult::from_network(
          Some(entity),
          status,
          request.clone(),
        )))
      }
      Err(e) => {
        warn!(url = %request.url, error = %e, "network read failed, serving cache");
        Ok(None)
      }
    }
  }

  async fn fetch_one<E: Entity>(
    &self,
    codec: &Codec<E>,
    request: &Request,
  ) -> std::result::Result<(u16, E, Value), TransportError> {
    let response = self.transport.request(request).await?;
    let entity = codec
      .from_payload(response.body.clone())
      .map_err(|e| TransportError::Decode(e.to_string()))?;
    Ok((response.status, entity, response.body))
  }

  async fn fetch_list<E: Entity>(
    &self,
    codec: &Codec<E>,
    request: &Request,
  ) -> std::result::Result<(u16, Vec<E>, Vec<(String, Value)>), TransportError> {
    let response = self.transport.request(request).await?;
    let Value::Array(items) = response.body else {
      return Err(TransportError::Decode("expected a JSON array".to_string()));
    };

    let mut entities = Vec::with_capacity(items.len());
    let mut records = Vec::with_capacity(items.len());
    for item in items {
      let entity = codec
        .from_payload(item.clone())
        .map_err(|e| TransportError::Decode(e.to_string()))?;
      records.push((entity.entity_id(), item));
      entities.push(entity);
    }

    Ok((response.status, entities, records))
  }

  fn serve_one<E: Entity>(
    &self,
    codec: &Codec<E>,
    cached: Option<CachedRecord>,
    request: Request,
  ) -> Result<ApiResult<E>> {
    match cached.and_then(|record| decode_cached(codec, record)) {
      Some(entity) => {
        debug!(url = %request.url, "served from cache");
        Ok(ApiResult::from_cache(Some(entity), None, request))
      }
      None => Ok(ApiResult::from_cache(
        None,
        Some(MSG_NO_DATA.to_string()),
        request,
      )),
    }
  }

  async fn mutate<E: Entity>(
    &self,
    codec: &Codec<E>,
    mutation: Mutation,
    url: &str,
    entity: &E,
    query: &[(&str, &str)],
  ) -> Result<ApiResult<E>> {
    let payload = codec.to_payload(entity)?;
    let id = entity.entity_id();
    let request = Request::new(mutation.into(), url, query).with_body(payload.clone());

    let reason = if self.monitor.is_connected_now() {
      match self.send(codec, &request).await {
        Ok((status, echoed)) => {
          self.apply_locally::<E>(mutation, &id, payload)?;
          return Ok(ApiResult::from_network(echoed, status, request));
        }
        Err(e) => {
          warn!(url, id = %id, error = %e, "mutation failed, queueing for replay");
          e.to_string()
        }
      }
    } else {
      MSG_NO_CONNECTIVITY.to_string()
    };

    self.queue.append(OperationDraft {
      mutation,
      url: url.to_string(),
      query: request.query.clone(),
      entity_type: E::entity_type().to_string(),
      entity_id: id.clone(),
      payload: payload.clone(),
    })?;
    self.apply_locally::<E>(mutation, &id, payload)?;

    Ok(ApiResult::pending(reason, request))
  }

  async fn send<E: Entity>(
    &self,
    codec: &Codec<E>,
    request: &Request,
  ) -> std::result::Result<(u16, Option<E>), TransportError> {
    let response = self.transport.request(request).await?;
    if response.body.is_null() {
      return Ok((response.status, None));
    }

    let echoed = codec
      .from_payload(response.body)
      .map_err(|e| TransportError::Decode(e.to_string()))?;
    Ok((response.status, Some(echoed)))
  }

  /// Make the cache reflect the intended state after `mutation`.
  fn apply_locally<E: Entity>(&self, mutation: Mutation, id: &str, payload: Value) -> Result<()> {
    match mutation {
      Mutation::Create | Mutation::Update => {
        self.cache.upsert_one(E::entity_type(), id, payload)?;
      }
      Mutation::Delete => {
        self.cache.delete(E::entity_type(), id)?;
      }
    }
    Ok(())
  }

  async fn mutate_list<E: Entity>(
    &self,
    mutation: Mutation,
    url: &str,
    entities: &[E],
    query: &[(&str, &str)],
  ) -> Result<ApiResult<Vec<E>>> {
    let codec = self.codec::<E>()?;

    let mut payloads = Vec::new();
    let mut bodies = Vec::with_capacity(entities.len());
    let mut pending = 0;
    let mut status = STATUS_OK;

    for entity in entities {
      let result = self.mutate(&codec, mutation, url, entity, query).await?;
      if result.is_degraded() {
        pending += 1;
      } else {
        status = result.status_code;
      }
      bodies.extend(result.request.body);
      payloads.extend(result.payload);
    }

    let request = Request::new(mutation.into(), url, query).with_body(Value::Array(bodies));
    if pending == 0 {
      Ok(ApiResult::from_network(Some(payloads), status, request))
    } else {
      let message = format!("{} of {} operations pending", pending, entities.len());
      Ok(ApiResult::partial(payloads, message, request))
    }
  }
}

impl<T: Transport, S: DocumentStore + 'static> Drop for OfflineClient<T, S> {
  fn drop(&mut self) {
    self.replay_task.abort();
  }
}

/// Decode a cached record, skipping it if the current codec rejects it.
fn decode_cached<E: Entity>(codec: &Codec<E>, record: CachedRecord) -> Option<E> {
  match codec.from_payload(record.payload) {
    Ok(entity) => Some(entity),
    Err(e) => {
      warn!(
        entity_type = %record.entity_type,
        id = %record.id,
        error = %e,
        "skipping undecodable cached record"
      );
      None
    }
  }
}
