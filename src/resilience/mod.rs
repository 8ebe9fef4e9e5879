//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to an upstream:
//!     → single_flight.rs (join an identical pending call, if any)
//!     → retries.rs (classify each attempt, retry transient failures)
//!         → backoff.rs (min(base * 2^(n-1), cap) between attempts)
//! ```
//!
//! # Design Decisions
//! - Timeouts are enforced by the transport; every attempt has a deadline
//! - Only transient failures (network faults, 429, 503) are retried
//! - Retry delays are taken from the injected clock so they can be observed

pub mod backoff;
pub mod retries;
pub mod single_flight;

pub use retries::{run_with_retry, AttemptOutcome, RequestAttempt, RetryPolicy};
pub use single_flight::SingleFlight;
