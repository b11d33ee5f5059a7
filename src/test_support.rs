//! Test doubles shared by the unit tests.

use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::cache::DocumentStore;
use crate::error::{StorageError, StorageResult};
use crate::remote::{Method, Request, Response, Transport, TransportError};

type Handler = Box<dyn Fn(usize, &Request) -> Result<Response, TransportError> + Send + Sync>;

/// Scripted transport that records every request it receives.
pub struct MockTransport {
  calls: Mutex<Vec<Request>>,
  handler: Handler,
  delay: Option<Duration>,
}

impl MockTransport {
  /// Answer each call with `handler(call_index, request)`.
  pub fn new<F>(handler: F) -> Self
  where
    F: Fn(usize, &Request) -> Result<Response, TransportError> + Send + Sync + 'static,
  {
    Self {
      calls: Mutex::new(Vec::new()),
      handler: Box::new(handler),
      delay: None,
    }
  }

  /// Mutations echo their body back with 200/201; reads get an empty body.
  pub fn echo() -> Self {
    Self::new(|_, request| Ok(echo_response(request)))
  }

  /// Echo, except the calls at the given indices fail.
  pub fn fail_calls(failing: &[usize]) -> Self {
    let failing = failing.to_vec();
    Self::new(move |index, request| {
      if failing.contains(&index) {
        Err(TransportError::Status {
          status: 503,
          message: "Service Unavailable".to_string(),
        })
      } else {
        Ok(echo_response(request))
      }
    })
  }

  /// Every call fails to connect.
  pub fn unreachable() -> Self {
    Self::new(|_, _| Err(TransportError::Connection("connection refused".to_string())))
  }

  /// Every read answers with `body`; mutations echo.
  pub fn serving(body: Value) -> Self {
    Self::new(move |_, request| match request.method {
      Method::Get => Ok(Response {
        status: 200,
        body: body.clone(),
      }),
      _ => Ok(echo_response(request)),
    })
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn calls(&self) -> Vec<Request> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }
}

fn echo_response(request: &Request) -> Response {
  let status = match request.method {
    Method::Post => 201,
    _ => 200,
  };
  Response {
    status,
    body: request.body.clone().unwrap_or(Value::Null),
  }
}

impl Transport for MockTransport {
  async fn request(&self, request: &Request) -> Result<Response, TransportError> {
    let index = {
      let mut calls = self.calls.lock().unwrap();
      calls.push(request.clone());
      calls.len() - 1
    };
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    (self.handler)(index, request)
  }
}

/// Store wrapper counting every call that reaches the backend.
pub struct CountingStore<S> {
  inner: S,
  calls: AtomicUsize,
}

impl<S: DocumentStore> CountingStore<S> {
  pub fn new(inner: S) -> Self {
    Self {
      inner,
      calls: AtomicUsize::new(0),
    }
  }

  pub fn call_count(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  fn hit(&self) {
    self.calls.fetch_add(1, Ordering::SeqCst);
  }
}

impl<S: DocumentStore> DocumentStore for CountingStore<S> {
  fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Value>> {
    self.hit();
    self.inner.get(collection, id)
  }

  fn list(&self, collection: &str) -> StorageResult<Vec<(String, Value)>> {
    self.hit();
    self.inner.list(collection)
  }

  fn put(&self, collection: &str, id: &str, document: &Value) -> StorageResult<()> {
    self.hit();
    self.inner.put(collection, id, document)
  }

  fn delete(&self, collection: &str, id: &str) -> StorageResult<bool> {
    self.hit();
    self.inner.delete(collection, id)
  }

  fn replace(&self, collection: &str, documents: &[(String, Value)]) -> StorageResult<()> {
    self.hit();
    self.inner.replace(collection, documents)
  }
}

/// Store whose writes always fail; reads see an empty store.
pub struct BrokenStore;

impl DocumentStore for BrokenStore {
  fn get(&self, _collection: &str, _id: &str) -> StorageResult<Option<Value>> {
    Ok(None)
  }

  fn list(&self, _collection: &str) -> StorageResult<Vec<(String, Value)>> {
    Ok(Vec::new())
  }

  fn put(&self, _collection: &str, _id: &str, _document: &Value) -> StorageResult<()> {
    Err(StorageError::InvalidData("disk full".to_string()))
  }

  fn delete(&self, _collection: &str, _id: &str) -> StorageResult<bool> {
    Err(StorageError::InvalidData("disk full".to_string()))
  }

  fn replace(&self, _collection: &str, _documents: &[(String, Value)]) -> StorageResult<()> {
    Err(StorageError::InvalidData("disk full".to_string()))
  }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
  for _ in 0..400 {
    if condition() {
      return;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
  }
  panic!("condition not reached in time");
}
