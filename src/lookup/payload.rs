//! Lookup payload validation.
//!
//! The upstream sometimes answers HTTP 200 with an error object in the body:
//!
//! ```json
//! {"status": {"message": "the hourly limit of 20000 credits has been exceeded", "value": 19}}
//! ```
//!
//! Those in-band codes are mapped onto the same errors an HTTP status would
//! produce, so rate limiting is retried whichever way it is reported.

use serde_json::Value;

use crate::config::EndpointConfig;
use crate::error::{IntegrationError, IntegrationResult};

/// How an in-band status code is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InBandStatus {
    /// The query matched nothing.
    NoResult,
    Error(IntegrationError),
}

/// Map an in-band status code onto the error taxonomy.
pub fn classify_in_band(code: u64, message: &str) -> InBandStatus {
    let upstream = |status: u16| IntegrationError::Upstream {
        status,
        body: message.to_string(),
    };
    match code {
        // invalid user / user does not exist
        10 => InBandStatus::Error(upstream(401)),
        15 => InBandStatus::NoResult,
        // daily, hourly, weekly credit limits
        18..=20 => InBandStatus::Error(upstream(429)),
        22 => InBandStatus::Error(upstream(503)),
        _ => InBandStatus::Error(IntegrationError::Protocol(format!(
            "upstream status {}: {}",
            code, message
        ))),
    }
}

/// Extract and validate the result collection from a lookup response body.
pub fn extract_records(body: &Value, endpoint: &EndpointConfig) -> IntegrationResult<Vec<Value>> {
    let object = body
        .as_object()
        .ok_or_else(|| IntegrationError::Protocol("lookup response is not a JSON object".into()))?;

    if let Some(status) = object.get("status").and_then(Value::as_object) {
        let code = status.get("value").and_then(status_code);
        let message = status
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return match code.map(|c| classify_in_band(c, message)) {
            Some(InBandStatus::NoResult) => Ok(Vec::new()),
            Some(InBandStatus::Error(error)) => Err(error),
            None => Err(IntegrationError::Protocol(format!(
                "unrecognized upstream status object: {}",
                message
            ))),
        };
    }

    let collection = object.get(&endpoint.collection_field).ok_or_else(|| {
        IntegrationError::Protocol(format!(
            "lookup response is missing '{}'",
            endpoint.collection_field
        ))
    })?;
    let records = collection.as_array().ok_or_else(|| {
        IntegrationError::Protocol(format!("'{}' is not an array", endpoint.collection_field))
    })?;

    for (index, record) in records.iter().enumerate() {
        let fields = record.as_object().ok_or_else(|| {
            IntegrationError::Protocol(format!("record {} is not an object", index))
        })?;
        if let Some(missing) = endpoint
            .required_fields
            .iter()
            .find(|f| fields.get(f.as_str()).map_or(true, Value::is_null))
        {
            return Err(IntegrationError::Protocol(format!(
                "record {} is missing required field '{}'",
                index, missing
            )));
        }
    }

    Ok(records.clone())
}

fn status_code(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
