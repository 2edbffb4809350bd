//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use fieldsync::config::SyncConfig;
use fieldsync::{
  Gateway, GatewayError, MemoryStore, Request, Response, RetryPolicy, SyncCoordinator,
  SyncPayload,
};
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub type Handler = Box<dyn FnMut(&Request) -> Result<Response, GatewayError> + Send>;

/// Gateway whose answers are decided by a swappable closure.
pub struct ScriptedGateway {
  handler: Mutex<Handler>,
  calls: Mutex<Vec<Request>>,
}

impl ScriptedGateway {
  pub fn new<F>(handler: F) -> Arc<Self>
  where
    F: FnMut(&Request) -> Result<Response, GatewayError> + Send + 'static,
  {
    Arc::new(Self {
      handler: Mutex::new(Box::new(handler)),
      calls: Mutex::new(Vec::new()),
    })
  }

  pub fn online() -> Arc<Self> {
    Self::new(|_| Ok(Response::new(200, Value::Null)))
  }

  pub fn offline() -> Arc<Self> {
    Self::new(|_| Err(GatewayError::Network("no route to host".into())))
  }

  pub fn set_handler<F>(&self, handler: F)
  where
    F: FnMut(&Request) -> Result<Response, GatewayError> + Send + 'static,
  {
    *self.handler.lock().unwrap() = Box::new(handler);
  }

  pub fn go_online(&self) {
    self.set_handler(|_| Ok(Response::new(200, Value::Null)));
  }

  pub fn go_offline(&self) {
    self.set_handler(|_| Err(GatewayError::Network("no route to host".into())));
  }

  pub fn calls(&self) -> Vec<Request> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }
}

impl Gateway for ScriptedGateway {
  fn call<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, GatewayError>> {
    self.calls.lock().unwrap().push(request.clone());
    let result = {
      let mut handler = self.handler.lock().unwrap();
      (*handler)(request)
    };
    Box::pin(async move { result })
  }
}

/// Gateway that parks every call until released, to hold a drain open.
#[derive(Default)]
pub struct GatedGateway {
  pub entered: Notify,
  pub release: Notify,
}

impl Gateway for GatedGateway {
  fn call<'a>(&'a self, _request: &'a Request) -> BoxFuture<'a, Result<Response, GatewayError>> {
    Box::pin(async move {
      self.entered.notify_one();
      self.release.notified().await;
      Ok(Response::new(200, Value::Null))
    })
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceQuote {
  pub market: String,
  pub crop: String,
  pub price: u32,
}

impl PriceQuote {
  pub fn new(crop: &str, price: u32) -> Self {
    Self {
      market: "nakuru".to_string(),
      crop: crop.to_string(),
      price,
    }
  }
}

impl SyncPayload for PriceQuote {
  fn endpoint(&self) -> String {
    "prices".to_string()
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobMessage {
  pub job_id: u64,
  pub text: String,
}

impl SyncPayload for JobMessage {
  fn endpoint(&self) -> String {
    format!("jobs/{}/messages", self.job_id)
  }
}

pub fn sync_config(max_retries: u32, retry_policy: RetryPolicy) -> SyncConfig {
  SyncConfig {
    max_retries,
    retry_policy,
    ..SyncConfig::default()
  }
}

pub fn coordinator<G: Gateway>(
  gateway: G,
  max_retries: u32,
  retry_policy: RetryPolicy,
) -> SyncCoordinator<G, MemoryStore> {
  SyncCoordinator::new(
    gateway,
    Arc::new(MemoryStore::new()),
    &sync_config(max_retries, retry_policy),
  )
}

pub fn rejected(status: u16) -> GatewayError {
  GatewayError::ServerRejected {
    status,
    body: json!({ "error": "rejected" }).to_string(),
  }
}
