//! HTTP plumbing subsystem.
//!
//! # Data Flow
//! ```text
//! SessionClient / LookupClient
//!     → request.rs (HttpRequest: method, url, headers, query, JSON body)
//!     → transport.rs (Transport trait)
//!         → client.rs (ReqwestTransport, per-request timeout)
//!         → scripted.rs (ScriptedTransport, in-memory, tests only)
//!     → response.rs (buffered HttpResponse, JSON decoding)
//! ```
//!
//! # Design Decisions
//! - Non-2xx responses are data, not errors; the clients decide what they mean
//! - Transport faults are classified once, here, into `NetworkFault`

pub mod client;
pub mod request;
pub mod response;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;
pub mod transport;

pub use client::ReqwestTransport;
pub use request::{HttpRequest, Method, X_REQUEST_ID};
pub use response::HttpResponse;
#[cfg(any(test, feature = "test-util"))]
pub use scripted::{Reply, ScriptedTransport};
pub use transport::Transport;
