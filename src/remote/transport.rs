//! The request/response primitive the dispatcher talks to the network with.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use crate::cache::Mutation;

/// HTTP verb of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
  Get,
  Post,
  Put,
  Delete,
}

impl From<Mutation> for Method {
  fn from(mutation: Mutation) -> Self {
    match mutation {
      Mutation::Create => Method::Post,
      Mutation::Update => Method::Put,
      Mutation::Delete => Method::Delete,
    }
  }
}

/// A request as issued by the dispatcher; also returned to callers as the
/// descriptor of what they asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
  pub method: Method,
  /// Path relative to the transport's base URL, or an absolute URL
  pub url: String,
  pub query: Vec<(String, String)>,
  pub body: Option<Value>,
}

impl Request {
  pub fn new(method: Method, url: &str, query: &[(&str, &str)]) -> Self {
    Self {
      method,
      url: url.to_string(),
      query: query
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
      body: None,
    }
  }

  pub fn with_body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }
}

/// A successful (2xx) response with its decoded JSON body.
///
/// An empty body decodes to `Value::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
  pub status: u16,
  pub body: Value,
}

/// Any way a request can fail. The dispatcher treats all variants alike.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
  /// The request never got an answer (DNS, refused, timeout, ...).
  #[error("connection failed: {0}")]
  Connection(String),

  /// The server answered with a non-2xx status.
  #[error("HTTP {status}: {message}")]
  Status { status: u16, message: String },

  /// The answer could not be decoded.
  #[error("malformed response: {0}")]
  Decode(String),
}

impl TransportError {
  /// HTTP status of the failure, when the server answered at all.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Status { status, .. } => Some(*status),
      _ => None,
    }
  }
}

/// Network primitive used by the dispatcher and the replayer.
pub trait Transport: Send + Sync + 'static {
  /// Issue `request`. Non-2xx answers must be reported as errors.
  fn request(
    &self,
    request: &Request,
  ) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
  fn request(
    &self,
    request: &Request,
  ) -> impl Future<Output = Result<Response, TransportError>> + Send {
    (**self).request(request)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_mutation_methods() {
    assert_eq!(Method::from(Mutation::Create), Method::Post);
    assert_eq!(Method::from(Mutation::Update), Method::Put);
    assert_eq!(Method::from(Mutation::Delete), Method::Delete);
  }

  #[test]
  fn test_request_builder() {
    let request = Request::new(Method::Post, "/todos", &[("page", "2")]).with_body(json!({"id": 1}));
    assert_eq!(request.query, vec![("page".to_string(), "2".to_string())]);
    assert_eq!(request.body, Some(json!({"id": 1})));
  }

  #[test]
  fn test_error_status() {
    let err = TransportError::Status {
      status: 503,
      message: "Service Unavailable".to_string(),
    };
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");
    assert_eq!(TransportError::Connection("refused".into()).status(), None);
  }
}
