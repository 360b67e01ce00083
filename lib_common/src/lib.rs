//! # Enroute Shared Library
//!
//! Reusable components for the enroute realtime vehicle tracking gateway:
//! the upstream telemetry ingestor, the subscription registry and fan-out
//! state, the geocoding enrichment service, and the advisory cache store
//! backing it.

// Declare the modules to re-export
pub mod connections;
pub mod core;
pub mod error;
pub mod geocode;
pub mod ingestors;
pub mod models;
pub mod retrieve;
pub mod utils;

// Re-export the primary types
pub use connections::{CacheBackend, CacheStore, MemoryBackend, RedisBackend};
pub use crate::core::{ClientMessage, GatewayState, ServerMessage, SubscriptionRegistry};
pub use error::{GeocodeError, ProviderError};
pub use geocode::{GeocodeProvider, GeocodeService, MapboxClient, Place, RouteQuery, RouteResponse};
pub use ingestors::{ClientState, TelemetryClient, TelemetryConfig};
pub use models::{Device, Position, TelemetryEvent, TelemetryFrame};
pub use retrieve::{ApiClient, DeviceDirectory, TraccarApi};
