//! Error taxonomy shared by the session and lookup clients.

use std::fmt;
use thiserror::Error;

/// HTTP statuses that signal a temporary upstream condition.
pub const TRANSIENT_STATUSES: [u16; 2] = [429, 503];

/// Transport-level fault behind a [`IntegrationError::Network`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFault {
    /// The per-request deadline elapsed.
    Timeout,
    /// Connection could not be established (includes DNS failures).
    Connect,
    /// Connection was reset or aborted mid-exchange.
    Reset,
    /// Any other transport failure.
    Other,
}

impl fmt::Display for NetworkFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NetworkFault::Timeout => "timeout",
            NetworkFault::Connect => "connect",
            NetworkFault::Reset => "reset",
            NetworkFault::Other => "other",
        };
        f.write_str(label)
    }
}

/// Errors surfaced by the integration layer.
///
/// The type is `Clone` so one failed in-flight operation can be handed to
/// every caller that joined it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntegrationError {
    /// Missing or invalid setup. Raised before any network call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The login endpoint rejected the configured credentials.
    #[error("Login rejected with status {status}")]
    Auth { status: u16, body: String },

    /// The upstream answered with a payload we cannot interpret.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Transport-level failure (timeout, connect, reset).
    #[error("Network error ({fault}): {message}")]
    Network { fault: NetworkFault, message: String },

    /// The upstream answered with a non-2xx status.
    #[error("Upstream returned status {status}")]
    Upstream { status: u16, body: String },

    /// The lookup yielded nothing and no fallback was available.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Coarse error kind, used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Auth,
    Protocol,
    TransientNetwork,
    FatalUpstream,
    NotFound,
}

/// Per-attempt retry classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Worth another attempt after a backoff delay.
    Transient,
    /// Retrying cannot help; abort the call.
    Fatal,
}

impl IntegrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IntegrationError::Configuration(_) => ErrorKind::Configuration,
            IntegrationError::Auth { .. } => ErrorKind::Auth,
            IntegrationError::Protocol(_) => ErrorKind::Protocol,
            IntegrationError::Network { .. } => ErrorKind::TransientNetwork,
            IntegrationError::Upstream { status, .. } if TRANSIENT_STATUSES.contains(status) => {
                ErrorKind::TransientNetwork
            }
            IntegrationError::Upstream { .. } => ErrorKind::FatalUpstream,
            IntegrationError::NotFound(_) => ErrorKind::NotFound,
        }
    }

    /// Classify a failed attempt.
    pub fn retry_class(&self) -> RetryClass {
        match self.kind() {
            ErrorKind::TransientNetwork => RetryClass::Transient,
            _ => RetryClass::Fatal,
        }
    }

    /// Status code carried by the error, if it came from an HTTP exchange.
    pub fn status(&self) -> Option<u16> {
        match self {
            IntegrationError::Auth { status, .. } | IntegrationError::Upstream { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    pub(crate) fn network(fault: NetworkFault, message: impl Into<String>) -> Self {
        IntegrationError::Network {
            fault,
            message: message.into(),
        }
    }
}

/// Result type for integration operations.
pub type IntegrationResult<T> = Result<T, IntegrationError>;
