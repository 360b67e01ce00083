//! # Position Enrichment Step
//!
//! Applied to every position before it leaves the system: reverse-geocode
//! the coordinates when no address came from the provider, and normalize
//! speed from knots to km/h. Failures never escape: a missing address is
//! not an error, and a geocoding transport failure only costs this one
//! position its address.

use crate::error::GeocodeError;
use crate::geocode::GeocodeService;
use crate::models::Position;
use crate::utils::convert_knots_to_kmh;

/// Enriches one position in place.
pub async fn enrich_position(geocoder: &GeocodeService, position: &mut Position) {
    if position.address.is_none() {
        if let (Some(latitude), Some(longitude)) = (position.latitude, position.longitude) {
            match geocoder.resolve_address(latitude, longitude).await {
                Ok(address) => position.address = Some(address),
                Err(GeocodeError::NotFound) => {
                    log::debug!(
                        "No address found for position at lat: {}, lon: {}",
                        latitude,
                        longitude
                    );
                }
                Err(err) => {
                    log::error!("Error getting address for position: {}", err);
                }
            }
        }
    }

    if let Some(speed) = position.speed {
        position.speed = Some(convert_knots_to_kmh(speed) as f64);
    }
}
