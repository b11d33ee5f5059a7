//! Caller-visible result of a dispatcher call.

use serde::Serialize;

use super::transport::Request;

/// Status used for every result that did not complete against the network.
pub const STATUS_DEGRADED: u16 = 206;

/// Status reported for a fully successful list call with no elements.
pub const STATUS_OK: u16 = 200;

pub const MSG_NO_CONNECTIVITY: &str = "no connectivity";
pub const MSG_NO_DATA: &str = "no data available";

/// Indicates where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
  /// Confirmed by the network
  Network,
  /// Network unavailable or failed, served from the local cache
  Cache,
  /// Mutation queued for replay, applied locally only
  Pending,
  /// List mutation where some elements were queued
  Partial,
}

/// Result of a dispatcher call.
///
/// Network failures never surface as errors; they show up here as a
/// degraded result (status [`STATUS_DEGRADED`], source other than
/// [`Source::Network`]) carrying the best locally known answer.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResult<P> {
  pub payload: Option<P>,
  pub status_code: u16,
  pub status_message: Option<String>,
  pub source: Source,
  /// The request as the caller issued it
  pub request: Request,
}

impl<P> ApiResult<P> {
  /// Create a result from a successful network call.
  pub fn from_network(payload: Option<P>, status_code: u16, request: Request) -> Self {
    Self {
      payload,
      status_code,
      status_message: None,
      source: Source::Network,
      request,
    }
  }

  /// Create a result served from the cache.
  pub fn from_cache(payload: Option<P>, message: Option<String>, request: Request) -> Self {
    Self {
      payload,
      status_code: STATUS_DEGRADED,
      status_message: message,
      source: Source::Cache,
      request,
    }
  }

  /// Create a result for a mutation that was queued instead of confirmed.
  pub fn pending(message: impl Into<String>, request: Request) -> Self {
    Self {
      payload: None,
      status_code: STATUS_DEGRADED,
      status_message: Some(message.into()),
      source: Source::Pending,
      request,
    }
  }

  /// Create an aggregate result for a list mutation with queued elements.
  pub fn partial(payload: P, message: impl Into<String>, request: Request) -> Self {
    Self {
      payload: Some(payload),
      status_code: STATUS_DEGRADED,
      status_message: Some(message.into()),
      source: Source::Partial,
      request,
    }
  }

  pub fn is_degraded(&self) -> bool {
    self.source != Source::Network
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::Method;

  #[test]
  fn test_degraded_results_use_206() {
    let request = Request::new(Method::Get, "/todos", &[]);

    let cached = ApiResult::<u8>::from_cache(None, Some(MSG_NO_DATA.into()), request.clone());
    assert_eq!(cached.status_code, STATUS_DEGRADED);
    assert!(cached.is_degraded());

    let pending = ApiResult::<u8>::pending(MSG_NO_CONNECTIVITY, request.clone());
    assert_eq!(pending.status_code, STATUS_DEGRADED);
    assert_eq!(pending.source, Source::Pending);

    let ok = ApiResult::from_network(Some(1u8), 201, request);
    assert!(!ok.is_degraded());
    assert_eq!(ok.status_code, 201);
  }
}
