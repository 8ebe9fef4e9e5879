//! Resilient upstream integrations for the shipping-quote portal.
//!
//! Two independent clients share one vocabulary of cached state and bounded
//! retry:
//! - [`SessionClient`]: login-gated upstream with a cached bearer credential
//! - [`LookupClient`]: reference-data upstream with retry, long-TTL caching
//!   and stale-cache fallback

pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod lookup;
pub mod observability;
pub mod resilience;
pub mod session;

pub use config::IntegrationsConfig;
pub use error::{ErrorKind, IntegrationError, IntegrationResult};
pub use lookup::{Lookup, LookupClient, LookupParams, LookupSource};
pub use session::{ApiRequest, SessionClient};
