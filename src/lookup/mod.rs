//! Reference-data lookup subsystem.
//!
//! # Data Flow
//! ```text
//! caller → LookupClient::fetch(name, LookupParams)
//!     → endpoint.rs: cache key + upstream query
//!     → cache.rs: fresh entry? → matching.rs → Lookup (Cache)
//!     → single-flight refresh → retries (429/503/network) → payload.rs validation
//!     → cache overwrite → matching.rs → Lookup (Upstream)
//!     → failure: stale entry → Lookup (StaleCache)
//!                no entry    → degrade policy → Lookup (Degraded) or Err
//! ```
//!
//! # Design Decisions
//! - The cache holds the validated upstream collection; matching runs on
//!   every read so stale fallbacks are filtered the same way
//! - Expired entries are kept until overwritten
//! - Typed wrappers in `geo.rs` sit on top of the untyped `fetch`

pub mod cache;
pub mod client;
pub mod endpoint;
pub mod geo;
pub mod matching;
pub mod payload;
pub mod types;

pub use cache::{CacheEntry, LookupCache};
pub use client::LookupClient;
pub use geo::{City, Country, Place, PostalCode, Region};
pub use types::{Lookup, LookupParams, LookupSource};
