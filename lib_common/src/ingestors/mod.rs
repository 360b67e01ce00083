//! # Data Ingestors Module
//!
//! Clients for upstream data sources. The single source today is the
//! tracking provider's streaming socket, wrapped in a resilient client that
//! authenticates, streams, and reconnects with bounded retries.

/// The resilient streaming client for the tracking provider.
pub mod traccar_ws;

pub use traccar_ws::{ClientState, TelemetryClient, TelemetryConfig};
