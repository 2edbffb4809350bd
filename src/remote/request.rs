//! Request and response shapes exchanged with the remote service.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::error::GatewayError;

/// HTTP method of a remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
  Get,
  Post,
  Put,
  Patch,
  Delete,
}

impl From<Method> for reqwest::Method {
  fn from(method: Method) -> Self {
    match method {
      Method::Get => reqwest::Method::GET,
      Method::Post => reqwest::Method::POST,
      Method::Put => reqwest::Method::PUT,
      Method::Patch => reqwest::Method::PATCH,
      Method::Delete => reqwest::Method::DELETE,
    }
  }
}

/// A single logical call to the remote service.
///
/// Requests are persisted verbatim in the pending queue, so everything needed
/// to replay the call later lives here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
  pub method: Method,
  /// Endpoint path relative to the configured base URL (e.g. "prices")
  pub endpoint: String,
  /// JSON body, if any
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body: Option<Value>,
  /// Sent as `Idempotency-Key` so the server can deduplicate retried writes
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub idempotency_key: Option<String>,
}

impl Request {
  pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
    Self {
      method,
      endpoint: endpoint.into(),
      body: None,
      idempotency_key: None,
    }
  }

  pub fn get(endpoint: impl Into<String>) -> Self {
    Self::new(Method::Get, endpoint)
  }

  pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
    Self::new(Method::Post, endpoint).with_body(body)
  }

  pub fn with_body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
    self.idempotency_key = Some(key.into());
    self
  }
}

/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
  pub status: u16,
  /// Decoded JSON body; `Value::Null` when the server sent nothing
  pub body: Value,
}

impl Response {
  pub fn new(status: u16, body: Value) -> Self {
    Self { status, body }
  }

  /// Decode the body into a caller type.
  pub fn json<T: DeserializeOwned>(self) -> Result<T, GatewayError> {
    serde_json::from_value(self.body).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
  }
}
