//! Bearer credential and login response parsing.
//!
//! Login providers do not agree on a response schema. The token is resolved
//! through a fixed alias table, tried in order:
//!
//! | Field            | Meaning                         |
//! |------------------|---------------------------------|
//! | `token`          | bearer token                    |
//! | `access_token`   | bearer token (OAuth style)      |
//! | `authToken`      | bearer token (camelCase APIs)   |
//! | `expires_in`     | lifetime in seconds (optional)  |
//! | `expiresIn`      | lifetime in seconds (optional)  |
//!
//! A response that is not a JSON object, or that carries none of the token
//! fields, is rejected as a protocol error.

use serde_json::Value;
use std::time::{Duration, SystemTime};

use crate::error::{IntegrationError, IntegrationResult};

pub const TOKEN_FIELD_ALIASES: [&str; 3] = ["token", "access_token", "authToken"];

pub const EXPIRY_FIELD_ALIASES: [&str; 2] = ["expires_in", "expiresIn"];

/// The single cached credential for one upstream.
///
/// Replaced wholesale on refresh, never mutated in place.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedCredential {
    token: String,
    acquired_at: SystemTime,
    valid_until: SystemTime,
}

impl CachedCredential {
    pub fn new(token: impl Into<String>, acquired_at: SystemTime, valid_until: SystemTime) -> Self {
        Self {
            token: token.into(),
            acquired_at,
            valid_until,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn acquired_at(&self) -> SystemTime {
        self.acquired_at
    }

    pub fn valid_until(&self) -> SystemTime {
        self.valid_until
    }

    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        now < self.valid_until
    }

    /// `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl std::fmt::Debug for CachedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedCredential")
            .field("token", &"<redacted>")
            .field("acquired_at", &self.acquired_at)
            .field("valid_until", &self.valid_until)
            .finish()
    }
}

/// What a successful login response grants.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub token: String,
    pub expires_in: Option<Duration>,
}

impl std::fmt::Debug for LoginGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginGrant")
            .field("token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Extract the token (and stated lifetime, if any) from a login response.
pub fn parse_login_response(body: &Value) -> IntegrationResult<LoginGrant> {
    let object = body.as_object().ok_or_else(|| {
        IntegrationError::Protocol("login response is not a JSON object".to_string())
    })?;

    let (field, raw) = TOKEN_FIELD_ALIASES
        .iter()
        .find_map(|alias| object.get(*alias).map(|v| (*alias, v)))
        .ok_or_else(|| {
            IntegrationError::Protocol(format!(
                "login response carries none of {}",
                TOKEN_FIELD_ALIASES.join(", ")
            ))
        })?;

    let token = raw
        .as_str()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            IntegrationError::Protocol(format!("login field '{}' is not a non-empty string", field))
        })?;

    let expires_in = EXPIRY_FIELD_ALIASES
        .iter()
        .find_map(|alias| object.get(*alias))
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

    Ok(LoginGrant {
        token: token.to_string(),
        expires_in,
    })
}

/// How long a credential is trusted: the lifetime minus the guard band, but
/// never less than half the lifetime.
pub fn validity_window(lifetime: Duration, guard_band: Duration) -> Duration {
    lifetime.saturating_sub(guard_band).max(lifetime / 2)
}
