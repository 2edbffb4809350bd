//! Writes the engine can queue and replay.

use color_eyre::{eyre::eyre, Result};
use serde::Serialize;

use crate::remote::{Method, Request};

/// A write request kind.
///
/// Each payload type names its own endpoint, so one engine instance serves
/// price submissions, messages, job offers and so on.
pub trait SyncPayload: Serialize {
  /// Endpoint path the payload is delivered to
  fn endpoint(&self) -> String;

  fn method(&self) -> Method {
    Method::Post
  }

  /// Build the request that carries this payload.
  fn to_request(&self) -> Result<Request> {
    let body = serde_json::to_value(self)
      .map_err(|e| eyre!("Failed to serialize payload for {}: {}", self.endpoint(), e))?;
    Ok(Request::new(self.method(), self.endpoint()).with_body(body))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[derive(Serialize)]
  struct Rating {
    worker_id: u64,
    stars: u8,
  }

  impl SyncPayload for Rating {
    fn endpoint(&self) -> String {
      format!("workers/{}/ratings", self.worker_id)
    }

    fn method(&self) -> Method {
      Method::Put
    }
  }

  #[test]
  fn request_carries_endpoint_method_and_body() {
    let request = Rating {
      worker_id: 7,
      stars: 5,
    }
    .to_request()
    .unwrap();

    assert_eq!(request.method, Method::Put);
    assert_eq!(request.endpoint, "workers/7/ratings");
    assert_eq!(request.body, Some(json!({"worker_id": 7, "stars": 5})));
    assert_eq!(request.idempotency_key, None);
  }
}
