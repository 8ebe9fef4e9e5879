//! Transport abstraction shared by both clients.
//!
//! A transport turns one [`HttpRequest`] into one [`HttpResponse`]. A non-2xx
//! status is a valid response at this layer; only faults that prevent an
//! exchange (timeout, connect, reset) are errors.

use async_trait::async_trait;

use crate::error::IntegrationResult;
use crate::http::{HttpRequest, HttpResponse};

#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn send(&self, request: HttpRequest) -> IntegrationResult<HttpResponse>;
}
