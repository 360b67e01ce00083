//! # Utilities Module
//!
//! Small pure helpers shared across the pipeline.

/// Unit conversions for provider-native measurements.
pub mod units;
/// Timestamp normalization for provider history reads.
pub mod time;

pub use time::{normalize_position_timestamps, normalize_timestamp_to_utc};
pub use units::convert_knots_to_kmh;
