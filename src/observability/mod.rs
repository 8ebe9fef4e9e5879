//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! SessionClient, LookupClient, retry loop, single-flight
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → stderr (tracing-subscriber fmt layer)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
