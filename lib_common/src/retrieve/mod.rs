//! # HTTP Retrieval Module
//!
//! Outbound HTTP plumbing: a generic retrying API client, and the typed
//! client for the tracking provider's REST API (the device directory and
//! position history collaborator).

/// Generic asynchronous HTTP client with retry middleware.
pub mod ky_http;
/// Typed client for the tracking provider's REST API.
pub mod traccar_api;

pub use ky_http::{ApiClient, ApiResponse};
pub use traccar_api::{DeviceDirectory, TraccarApi};
