//! Timed, classified calls to the remote service.

use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::auth::TokenProvider;
use crate::config::RemoteConfig;

use super::error::GatewayError;
use super::request::{Request, Response};

/// Header carrying the client-generated operation id on writes.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Executes a single remote call and classifies the outcome.
///
/// Implementations never retry; callers decide what a failure means.
pub trait Gateway: Send + Sync {
  fn call<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, GatewayError>>;
}

impl<G: Gateway + ?Sized> Gateway for Arc<G> {
  fn call<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, GatewayError>> {
    (**self).call(request)
  }
}

/// JSON-over-HTTP gateway backed by reqwest.
#[derive(Clone)]
pub struct HttpGateway {
  client: reqwest::Client,
  base_url: Url,
  timeout: Duration,
  token: Arc<dyn TokenProvider>,
}

impl HttpGateway {
  pub fn new(config: &RemoteConfig, token: Arc<dyn TokenProvider>) -> Result<Self> {
    // Url::join drops the last path segment unless the base ends with '/'
    let mut base = config.base_url.clone();
    if !base.ends_with('/') {
      base.push('/');
    }
    let base_url =
      Url::parse(&base).map_err(|e| eyre!("Invalid base URL {}: {}", config.base_url, e))?;

    let client = reqwest::Client::builder()
      .timeout(config.timeout())
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url,
      timeout: config.timeout(),
      token,
    })
  }

  fn endpoint_url(&self, endpoint: &str) -> Result<Url, GatewayError> {
    self
      .base_url
      .join(endpoint.trim_start_matches('/'))
      .map_err(|e| GatewayError::InvalidRequest(format!("bad endpoint {}: {}", endpoint, e)))
  }

  async fn send(&self, request: &Request) -> Result<Response, GatewayError> {
    let url = self.endpoint_url(&request.endpoint)?;

    let mut builder = self.client.request(request.method.into(), url);
    if let Some(token) = self.token.bearer_token() {
      builder = builder.bearer_auth(token);
    }
    if let Some(key) = &request.idempotency_key {
      builder = builder.header(IDEMPOTENCY_HEADER, key);
    }
    if let Some(body) = &request.body {
      builder = builder.json(body);
    }

    let response = builder.send().await?;
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
      return Err(GatewayError::ServerRejected {
        status: status.as_u16(),
        body: String::from_utf8_lossy(&bytes).into_owned(),
      });
    }

    let body = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).map_err(|e| GatewayError::InvalidResponse(e.to_string()))?
    };

    Ok(Response::new(status.as_u16(), body))
  }
}

impl Gateway for HttpGateway {
  fn call<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, GatewayError>> {
    Box::pin(async move {
      debug!(method = ?request.method, endpoint = %request.endpoint, "remote call");

      // The client timeout covers the request; this one also bounds the body read
      let result = match tokio::time::timeout(self.timeout, self.send(request)).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout),
      };

      if let Err(err) = &result {
        debug!(endpoint = %request.endpoint, error = %err, "remote call failed");
      }
      result
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::auth::StaticToken;
  use serde_json::json;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;

  fn gateway(base_url: String, timeout_secs: u64, token: StaticToken) -> HttpGateway {
    let config = RemoteConfig {
      base_url,
      timeout_secs,
    };
    HttpGateway::new(&config, Arc::new(token)).unwrap()
  }

  /// Serve one connection with a canned response; yields the raw request head.
  async fn serve_once(
    status_line: &'static str,
    body: &'static str,
  ) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/api", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
      let (mut socket, _) = listener.accept().await.unwrap();
      let mut received = Vec::new();
      let mut buf = [0u8; 4096];
      while !received.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
          break;
        }
        received.extend_from_slice(&buf[..n]);
      }

      let response = format!(
        "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status_line,
        body.len(),
        body
      );
      socket.write_all(response.as_bytes()).await.unwrap();
      socket.shutdown().await.ok();
      String::from_utf8_lossy(&received).into_owned()
    });

    (base, handle)
  }

  #[tokio::test]
  async fn success_decodes_json_and_sends_credentials() {
    let (base, server) = serve_once("200 OK", r#"[{"crop":"maize","price":12}]"#).await;
    let gateway = gateway(base, 5, StaticToken::new("t0k"));

    let request = Request::post("prices", json!({"crop": "maize"})).with_idempotency_key("op-1");
    let response = gateway.call(&request).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body[0]["crop"], "maize");

    let head = server.await.unwrap().to_lowercase();
    assert!(head.starts_with("post /api/prices "));
    assert!(head.contains("authorization: bearer t0k"));
    assert!(head.contains("idempotency-key: op-1"));
  }

  #[tokio::test]
  async fn anonymous_calls_have_no_authorization_header() {
    let (base, server) = serve_once("204 No Content", "").await;
    let gateway = gateway(base, 5, StaticToken::anonymous());

    let response = gateway.call(&Request::get("/prices")).await.unwrap();
    assert_eq!(response.body, Value::Null);

    let head = server.await.unwrap().to_lowercase();
    assert!(head.starts_with("get /api/prices "));
    assert!(!head.contains("authorization:"));
  }

  #[tokio::test]
  async fn non_success_status_is_server_rejected() {
    let (base, server) = serve_once("422 Unprocessable Entity", r#"{"error":"price"}"#).await;
    let gateway = gateway(base, 5, StaticToken::anonymous());

    let err = gateway
      .call(&Request::post("prices", json!({})))
      .await
      .unwrap_err();
    match err {
      GatewayError::ServerRejected { status, body } => {
        assert_eq!(status, 422);
        assert!(body.contains("price"));
      }
      other => panic!("unexpected error: {other:?}"),
    }
    server.await.unwrap();
  }

  #[tokio::test]
  async fn malformed_body_is_invalid_response() {
    let (base, server) = serve_once("200 OK", "not json").await;
    let gateway = gateway(base, 5, StaticToken::anonymous());

    let err = gateway.call(&Request::get("prices")).await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidResponse(_)));
    server.await.unwrap();
  }

  #[tokio::test]
  async fn closed_port_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/", listener.local_addr().unwrap());
    drop(listener);

    let gateway = gateway(base, 5, StaticToken::anonymous());
    let err = gateway.call(&Request::get("prices")).await.unwrap_err();
    assert!(matches!(err, GatewayError::Network(_)), "got {err:?}");
  }

  #[tokio::test]
  async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/", listener.local_addr().unwrap());
    let server = tokio::spawn(async move {
      let (socket, _) = listener.accept().await.unwrap();
      tokio::time::sleep(Duration::from_secs(5)).await;
      drop(socket);
    });

    let gateway = HttpGateway {
      timeout: Duration::from_millis(200),
      ..gateway(base, 5, StaticToken::anonymous())
    };
    let err = gateway.call(&Request::get("prices")).await.unwrap_err();
    assert_eq!(err, GatewayError::Timeout);
    server.abort();
  }

  #[test]
  fn invalid_base_url_is_rejected() {
    let config = RemoteConfig {
      base_url: "not a url".to_string(),
      timeout_secs: 1,
    };
    assert!(HttpGateway::new(&config, Arc::new(StaticToken::anonymous())).is_err());
  }
}
