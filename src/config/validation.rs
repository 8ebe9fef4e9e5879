//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (attempts >= 1, delays ordered, TTLs > 0)
//! - Check that every configured URL parses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Unset credentials and URLs are not errors here; the clients fail fast
//!   with a configuration error when they are actually needed

use std::fmt;
use url::Url;

use crate::config::schema::IntegrationsConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &IntegrationsConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let session = &config.session;
    for (field, value) in [
        ("session.login_url", &session.login_url),
        ("session.base_url", &session.base_url),
    ] {
        if let Some(url) = value {
            check_url(field, url, &mut errors);
        }
    }
    if session.assumed_token_lifetime_secs == 0 {
        errors.push(ValidationError::new(
            "session.assumed_token_lifetime_secs",
            "must be greater than zero",
        ));
    }
    if session.guard_band_secs >= session.assumed_token_lifetime_secs {
        errors.push(ValidationError::new(
            "session.guard_band_secs",
            "must be smaller than the assumed token lifetime",
        ));
    }
    if session.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "session.request_timeout_secs",
            "must be greater than zero",
        ));
    }

    let lookup = &config.lookup;
    check_url("lookup.base_url", &lookup.base_url, &mut errors);
    if lookup.client_id_param.trim().is_empty() {
        errors.push(ValidationError::new("lookup.client_id_param", "must not be empty"));
    }
    if lookup.cache_ttl_secs == 0 {
        errors.push(ValidationError::new(
            "lookup.cache_ttl_secs",
            "must be greater than zero",
        ));
    }
    if lookup.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "lookup.request_timeout_secs",
            "must be greater than zero",
        ));
    }

    let retry = &lookup.retry;
    if retry.max_attempts == 0 {
        errors.push(ValidationError::new(
            "lookup.retry.max_attempts",
            "must be at least 1",
        ));
    }
    if retry.base_delay_ms > retry.max_delay_ms {
        errors.push(ValidationError::new(
            "lookup.retry.base_delay_ms",
            "must not exceed max_delay_ms",
        ));
    }
    if !(0.0..=1.0).contains(&retry.jitter_ratio) {
        errors.push(ValidationError::new(
            "lookup.retry.jitter_ratio",
            "must be between 0 and 1",
        ));
    }

    for (name, endpoint) in &lookup.endpoints {
        if endpoint.path.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("lookup.endpoints.{}.path", name),
                "must not be empty",
            ));
        }
        if endpoint.collection_field.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("lookup.endpoints.{}.collection_field", name),
                "must not be empty",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(field: &str, value: &str, errors: &mut Vec<ValidationError>) {
    if let Err(e) = Url::parse(value) {
        errors.push(ValidationError::new(field, format!("invalid URL: {}", e)));
    }
}
