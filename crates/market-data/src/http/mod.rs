//! Shared HTTP plumbing for price sources.
//!
//! One [`HttpClient`] is built from [`SourceConfig`](crate::SourceConfig) and
//! cloned into every source, so all requests share the connection pool,
//! timeout and proxy.

mod client;

pub use client::{HttpClient, USER_AGENT};
