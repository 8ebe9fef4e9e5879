//! Reqwest-backed transport.
//!
//! # Responsibilities
//! - Enforce the fixed per-request timeout
//! - Map reqwest failures onto [`NetworkFault`]s
//! - Buffer the full body so callers can inspect it more than once

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{IntegrationError, IntegrationResult, NetworkFault};
use crate::http::{HttpRequest, HttpResponse, Transport};

/// Production transport over a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> IntegrationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                IntegrationError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> IntegrationResult<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

/// Classify a reqwest error. The URL is stripped since lookup URLs carry the
/// client identifier in their query string.
fn map_reqwest_error(error: reqwest::Error) -> IntegrationError {
    if error.is_builder() {
        return IntegrationError::Configuration(format!(
            "Invalid upstream request: {}",
            error.without_url()
        ));
    }
    let fault = if error.is_timeout() {
        NetworkFault::Timeout
    } else if error.is_connect() {
        NetworkFault::Connect
    } else if error.is_body() || error.is_decode() || error.is_request() {
        NetworkFault::Reset
    } else {
        NetworkFault::Other
    };
    IntegrationError::network(fault, error.without_url().to_string())
}
