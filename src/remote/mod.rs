//! Remote service access.
//!
//! A [`Gateway`] performs exactly one timed call and reports the outcome as
//! `Ok(Response)` or a classified [`GatewayError`]. Retrying is the job of
//! the sync layer.

mod error;
mod gateway;
mod request;

pub use error::GatewayError;
pub use gateway::{Gateway, HttpGateway, IDEMPOTENCY_HEADER};
pub use request::{Method, Request, Response};
