//! Unit conversions.

/// Converts a speed from knots (the provider's native unit) to km/h,
/// rounded to the nearest integer.
pub fn convert_knots_to_kmh(speed: f64) -> i64 {
    (speed * 1.852).round() as i64
}
