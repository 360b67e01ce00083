//! # Geocode Service
//!
//! Cache-fronted address resolution. Reverse geocoding checks the exact
//! coordinate key, then scans the geocoding namespace for a physically
//! adjacent cached point, and only then calls the provider. The scan is
//! linear in the number of cached geocoding keys, which stays bounded by
//! device count times distinct stop locations rather than total trajectory
//! samples.

use std::sync::Arc;

use crate::connections::CacheStore;
use crate::error::GeocodeError;
use crate::geocode::{GeocodeProvider, Place, RouteQuery, RouteResponse};

/// Two coordinate pairs within this delta on both axes are treated as the
/// same location for caching purposes (~100 m).
pub const PROXIMITY_THRESHOLD_DEG: f64 = 0.001;

/// TTL for resolved addresses and place searches. Addresses move rarely.
pub const GEOCODE_TTL_SECS: u64 = 7 * 24 * 3600;

/// TTL for route results. Routes are more volatile than places.
pub const ROUTE_TTL_SECS: u64 = 24 * 3600;

/// Builds the semantic cache key for a reverse-geocode result. Embeds the
/// raw coordinates so the proximity scan can parse them back out.
fn geocode_key(latitude: f64, longitude: f64) -> String {
    format!("geocode:{}:{}", latitude, longitude)
}

/// Parses a geocoding cache key back into its coordinate pair.
fn parse_geocode_key(key: &str) -> Option<(f64, f64)> {
    let mut parts = key.split(':');
    if parts.next() != Some("geocode") {
        return None;
    }
    let latitude: f64 = parts.next()?.parse().ok()?;
    let longitude: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((latitude, longitude))
}

/// The geocoding enrichment service.
pub struct GeocodeService {
    cache: CacheStore,
    provider: Arc<dyn GeocodeProvider>,
}

impl GeocodeService {
    /// Wires the service to its cache and provider.
    pub fn new(cache: CacheStore, provider: Arc<dyn GeocodeProvider>) -> Self {
        Self { cache, provider }
    }

    /// Resolves a coordinate pair to an address string.
    ///
    /// Lookup order: exact cache key, proximity scan over the geocoding
    /// namespace, then the provider. A provider hit is cached under the
    /// exact key; an empty provider result is `NotFound`.
    pub async fn resolve_address(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<String, GeocodeError> {
        let exact_key = geocode_key(latitude, longitude);
        if let Some(address) = self.cache.get::<String>(&exact_key).await {
            return Ok(address);
        }

        // Proximity pass: any cached point within the threshold on both axes
        // stands in for this one, avoiding a duplicate provider call for
        // physically adjacent samples.
        for key in self.cache.keys_matching("geocode:*").await {
            let Some((cached_lat, cached_lon)) = parse_geocode_key(&key) else {
                continue;
            };
            if (cached_lat - latitude).abs() <= PROXIMITY_THRESHOLD_DEG
                && (cached_lon - longitude).abs() <= PROXIMITY_THRESHOLD_DEG
            {
                if let Some(address) = self.cache.get::<String>(&key).await {
                    log::debug!(
                        "Proximity cache hit for ({}, {}) via ({}, {})",
                        latitude,
                        longitude,
                        cached_lat,
                        cached_lon
                    );
                    return Ok(address);
                }
            }
        }

        let places = self.provider.reverse_geocode(latitude, longitude).await?;
        let Some(best) = places.into_iter().next() else {
            return Err(GeocodeError::NotFound);
        };
        self.cache
            .set(&exact_key, &best.place_name, GEOCODE_TTL_SECS)
            .await;
        Ok(best.place_name)
    }

    /// Free-text address search, cached by the `(query, limit)` tuple.
    ///
    /// An empty provider result is returned but deliberately not cached, so
    /// a later provider-side correction is retried rather than pinned to
    /// empty for the TTL.
    pub async fn search_address(
        &self,
        query: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Place>, GeocodeError> {
        let key = format!(
            "address-search:{}:{}",
            query,
            limit.map(|l| l.to_string()).unwrap_or_else(|| "default".to_string())
        );
        if let Some(places) = self.cache.get::<Vec<Place>>(&key).await {
            return Ok(places);
        }
        let places = self.provider.search_places(query, limit).await?;
        if !places.is_empty() {
            self.cache.set(&key, &places, GEOCODE_TTL_SECS).await;
        }
        Ok(places)
    }

    /// Route search, cached by the full parameter tuple with a shorter TTL.
    pub async fn search_route(&self, query: &RouteQuery) -> Result<RouteResponse, GeocodeError> {
        let key = format!(
            "route-search:{}:{}:{}:{}:{}:{}:{}",
            query.start_latitude,
            query.start_longitude,
            query.end_latitude,
            query.end_longitude,
            query.alternatives.unwrap_or(false),
            query.steps.unwrap_or(false),
            query.geometries.as_deref().unwrap_or("geojson"),
        );
        if let Some(route) = self.cache.get::<RouteResponse>(&key).await {
            return Ok(route);
        }
        let route = self.provider.search_route(query).await?;
        self.cache.set(&key, &route, ROUTE_TTL_SECS).await;
        Ok(route)
    }
}
