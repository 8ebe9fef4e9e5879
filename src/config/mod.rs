//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (INTEGRATIONS_*)
//!     → validation.rs (semantic checks)
//!     → IntegrationsConfig (validated, immutable)
//!     → handed to SessionClient / LookupClient at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; clients copy what they need
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    default_endpoints, DegradePolicy, EndpointConfig, IntegrationsConfig, LookupConfig,
    MatchPolicy, MatchRule, ObservabilityConfig, OrderPolicy, RetryConfig, SessionConfig,
};
pub use validation::{validate_config, ValidationError};
