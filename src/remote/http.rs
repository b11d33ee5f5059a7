use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::transport::{Method, Request, Response, Transport, TransportError};

/// reqwest-backed transport resolving request paths against a base URL.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  base_url: Url,
}

impl HttpTransport {
  pub fn new(base_url: Url, timeout: Duration) -> reqwest::Result<Self> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;

    Ok(Self {
      client,
      base_url: with_trailing_slash(base_url),
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Resolve a request path. Leading slashes are relative to the base URL,
  /// so "/todos" on "https://host/api" is "https://host/api/todos".
  fn resolve(&self, path: &str) -> Result<Url, TransportError> {
    self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| TransportError::Connection(format!("invalid url {}: {}", path, e)))
  }
}

fn with_trailing_slash(mut url: Url) -> Url {
  if !url.path().ends_with('/') {
    let path = format!("{}/", url.path());
    url.set_path(&path);
  }
  url
}

impl Transport for HttpTransport {
  async fn request(&self, request: &Request) -> Result<Response, TransportError> {
    let url = self.resolve(&request.url)?;
    let method = match request.method {
      Method::Get => reqwest::Method::GET,
      Method::Post => reqwest::Method::POST,
      Method::Put => reqwest::Method::PUT,
      Method::Delete => reqwest::Method::DELETE,
    };

    let mut builder = self.client.request(method, url.clone());
    if !request.query.is_empty() {
      builder = builder.query(&request.query);
    }
    if let Some(body) = &request.body {
      builder = builder.json(body);
    }

    let response = builder
      .send()
      .await
      .map_err(|e| TransportError::Connection(e.to_string()))?;

    let status = response.status();
    let bytes = response
      .bytes()
      .await
      .map_err(|e| TransportError::Connection(e.to_string()))?;

    debug!(method = ?request.method, %url, status = status.as_u16(), "http request");

    if !status.is_success() {
      return Err(TransportError::Status {
        status: status.as_u16(),
        message: status_message(status, &bytes),
      });
    }

    let body = if bytes.iter().all(u8::is_ascii_whitespace) {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))?
    };

    Ok(Response {
      status: status.as_u16(),
      body,
    })
  }
}

/// Prefer the server's own error text, fall back to the reason phrase.
fn status_message(status: StatusCode, body: &[u8]) -> String {
  let text = String::from_utf8_lossy(body);
  let text = text.trim();
  if text.is_empty() {
    status
      .canonical_reason()
      .unwrap_or("unknown status")
      .to_string()
  } else {
    text.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};

  /// Serve exactly one canned HTTP response and return the raw request.
  async fn serve_once(response: &'static str) -> (Url, tokio::task::JoinHandle<String>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
      let (mut socket, _) = listener.accept().await.unwrap();
      let mut received = Vec::new();
      let mut buf = [0u8; 1024];
      // Read the headers, then whatever body content-length announces
      loop {
        let n = socket.read(&mut buf).await.unwrap();
        received.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&received).to_string();
        if let Some(end) = text.find("\r\n\r\n") {
          let body_len = text[..end]
            .lines()
            .find_map(|line| {
              let (name, value) = line.split_once(':')?;
              name
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
            })
            .unwrap_or(0);
          if received.len() >= end + 4 + body_len || n == 0 {
            break;
          }
        } else if n == 0 {
          break;
        }
      }
      socket.write_all(response.as_bytes()).await.unwrap();
      String::from_utf8_lossy(&received).to_string()
    });
    (Url::parse(&format!("http://{}/api", addr)).unwrap(), handle)
  }

  #[test]
  fn test_resolve_keeps_base_path() {
    let transport = HttpTransport::new(
      Url::parse("https://example.com/api").unwrap(),
      Duration::from_secs(1),
    )
    .unwrap();
    assert_eq!(
      transport.resolve("/todos").unwrap().as_str(),
      "https://example.com/api/todos"
    );
    assert_eq!(
      transport.resolve("todos/1").unwrap().as_str(),
      "https://example.com/api/todos/1"
    );
  }

  #[tokio::test]
  async fn test_success_decodes_json() {
    let (base, server) = serve_once(
      "HTTP/1.1 201 Created\r\ncontent-type: application/json\r\ncontent-length: 8\r\n\r\n{\"id\":1}",
    )
    .await;
    let transport = HttpTransport::new(base, Duration::from_secs(5)).unwrap();

    let request = Request::new(Method::Post, "/todos", &[("v", "1")]).with_body(json!({"id": 1}));
    let response = transport.request(&request).await.unwrap();
    assert_eq!(response.status, 201);
    assert_eq!(response.body, json!({"id": 1}));

    let received = server.await.unwrap();
    assert!(received.starts_with("POST /api/todos?v=1 HTTP/1.1"));
  }

  #[tokio::test]
  async fn test_empty_body_is_null() {
    let (base, _server) = serve_once("HTTP/1.1 204 No Content\r\n\r\n").await;
    let transport = HttpTransport::new(base, Duration::from_secs(5)).unwrap();

    let response = transport
      .request(&Request::new(Method::Delete, "/todos/1", &[]))
      .await
      .unwrap();
    assert_eq!(response.status, 204);
    assert_eq!(response.body, Value::Null);
  }

  #[tokio::test]
  async fn test_non_success_is_error() {
    let (base, _server) =
      serve_once("HTTP/1.1 500 Internal Server Error\r\ncontent-length: 4\r\n\r\nboom").await;
    let transport = HttpTransport::new(base, Duration::from_secs(5)).unwrap();

    let err = transport
      .request(&Request::new(Method::Get, "/todos", &[]))
      .await
      .unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("boom"));
  }

  #[tokio::test]
  async fn test_malformed_body_is_decode_error() {
    let (base, _server) =
      serve_once("HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\n{nope").await;
    let transport = HttpTransport::new(base, Duration::from_secs(5)).unwrap();

    let err = transport
      .request(&Request::new(Method::Get, "/todos", &[]))
      .await
      .unwrap_err();
    assert!(matches!(err, TransportError::Decode(_)));
  }
}
