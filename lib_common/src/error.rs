//! # Error Taxonomy
//!
//! Failures are split by how they propagate. Transport and auth failures on
//! the upstream provider are retried by the telemetry client's backoff cycle
//! and never surface to browser clients. `NotFound` is surfaced to the
//! immediate caller only. Cache failures never appear here at all: the
//! `CacheStore` swallows and logs them, degrading to a miss.

use thiserror::Error;

/// Errors from the upstream tracking provider's REST API.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network or socket level failure reaching the provider.
    #[error("provider transport failure: {0}")]
    Transport(#[source] anyhow::Error),

    /// Session establishment failed. Treated like a transport error for
    /// retry purposes by the telemetry client.
    #[error("provider authentication failed: {0}")]
    Auth(String),

    /// The requested device or position does not exist upstream.
    #[error("resource not found")]
    NotFound,

    /// The provider answered with a non-success status other than 404.
    #[error("provider returned status {status}: {body}")]
    Status {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Raw response body, for diagnostics.
        body: String,
    },
}

/// Errors from the geocoding/routing provider.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// The provider had no result for the query. Never fatal: enrichment
    /// leaves the address unset and moves on.
    #[error("no address found for the given coordinates")]
    NotFound,

    /// Anything else: network failure or an unexpected provider status.
    /// Propagated unchanged to the caller.
    #[error("geocoding transport failure: {0}")]
    Transport(#[source] anyhow::Error),
}

impl From<anyhow::Error> for GeocodeError {
    fn from(err: anyhow::Error) -> Self {
        GeocodeError::Transport(err)
    }
}
