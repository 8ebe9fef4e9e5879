//! Authenticated session subsystem.
//!
//! # Data Flow
//! ```text
//! caller → SessionClient::authorized_request(ApiRequest)
//!     → credential cached and valid?  yes → attach bearer
//!                                     no  → login (single-flight) → credential.rs parses token
//!     → transport.send
//!     → 401? invalidate → login → retry once
//!     → HttpResponse or IntegrationError
//! ```
//!
//! # Security Constraints
//! - Credentials come from configuration only; callers never supply them
//! - Tokens and passwords are redacted from Debug output and never logged
//! - Nothing is persisted; a restart always logs in again

pub mod client;
pub mod credential;

pub use client::{ApiRequest, CredentialInfo, SessionClient};
pub use credential::{CachedCredential, LoginGrant};
