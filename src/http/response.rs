//! Upstream response as seen by the clients.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{IntegrationError, IntegrationResult};

/// A fully buffered upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Build a response with a JSON body.
    pub fn json_body(status: u16, body: &Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.to_string().into_bytes(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body decoded as UTF-8 (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON. A body that does not parse is a protocol error.
    pub fn json<T: DeserializeOwned>(&self) -> IntegrationResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| IntegrationError::Protocol(format!("invalid JSON body: {}", e)))
    }

    /// Convert a non-2xx response into an upstream error carrying status and body.
    pub fn error_for_status(self) -> IntegrationResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(IntegrationError::Upstream {
                status: self.status,
                body: self.text(),
            })
        }
    }
}
