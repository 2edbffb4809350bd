//! Classification of remote call failures.

/// Why a remote call did not produce a successful response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
  /// The per-call deadline expired.
  #[error("remote call timed out")]
  Timeout,

  /// No response reached us (DNS, connect, reset, ...).
  #[error("network error: {0}")]
  Network(String),

  /// The server answered with a non-2xx status.
  #[error("server rejected request with status {status}: {body}")]
  ServerRejected { status: u16, body: String },

  /// The request could not be built (bad endpoint, unserializable body).
  #[error("invalid request: {0}")]
  InvalidRequest(String),

  /// A 2xx response whose body could not be decoded.
  #[error("invalid response: {0}")]
  InvalidResponse(String),
}

impl GatewayError {
  /// Whether retrying the same request later could succeed.
  ///
  /// Transport failures, 5xx, 408 and 429 are transient. Other 4xx answers and
  /// malformed requests/responses will fail the same way every time.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Timeout | Self::Network(_) => true,
      Self::ServerRejected { status, .. } => *status >= 500 || *status == 408 || *status == 429,
      Self::InvalidRequest(_) | Self::InvalidResponse(_) => false,
    }
  }

  /// HTTP status, when the server answered.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::ServerRejected { status, .. } => Some(*status),
      _ => None,
    }
  }
}

impl From<reqwest::Error> for GatewayError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      Self::Timeout
    } else if err.is_builder() {
      Self::InvalidRequest(err.to_string())
    } else {
      Self::Network(err.to_string())
    }
  }
}
