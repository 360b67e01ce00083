//! # Core Engine Module
//!
//! The routing heart of the gateway: the device-keyed subscription registry,
//! the per-position enrichment step, and the fan-out state tying them to the
//! connected client channels.

/// Device-keyed subscription registry behind a single lock.
pub mod registry;
/// The per-position enrichment step (address + unit normalization).
pub mod enrich;
/// Fan-out state: client channels, protocol messages, frame handling.
pub mod gateway;

// --- Public API Re-exports ---
pub use enrich::enrich_position;
pub use gateway::{ClientMessage, GatewayState, ServerMessage};
pub use registry::SubscriptionRegistry;
