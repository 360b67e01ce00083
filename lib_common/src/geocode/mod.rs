//! # Geocoding Enrichment Module
//!
//! Resolves coordinates to human-readable addresses with a proximity-aware
//! cache in front of the external geocoding provider, and serves the cached
//! address/route search passthroughs.

/// Mapbox implementation of the geocoding provider boundary.
pub mod mapbox;
/// The cache-fronted enrichment service.
pub mod service;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GeocodeError;

pub use mapbox::MapboxClient;
pub use service::{GeocodeService, GEOCODE_TTL_SECS, PROXIMITY_THRESHOLD_DEG, ROUTE_TTL_SECS};

/// One named place returned by address search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: String,
    pub place_name: String,
    pub longitude: f64,
    pub latitude: f64,
}

/// Parameters for a route computation between two coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteQuery {
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_latitude: f64,
    pub end_longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometries: Option<String>,
}

/// A route computation result. The full route list is surfaced: when
/// alternatives are requested, the caller receives all of them, not just
/// the provider's best pick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteResponse {
    pub code: Option<String>,
    pub routes: Vec<Value>,
    pub waypoints: Option<Value>,
}

/// The external geocoding/routing provider boundary.
#[async_trait::async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// Places near a coordinate, most relevant first. An empty vec means the
    /// provider knows no address there.
    async fn reverse_geocode(&self, latitude: f64, longitude: f64)
        -> Result<Vec<Place>, GeocodeError>;

    /// Free-text place search.
    async fn search_places(
        &self,
        query: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Place>, GeocodeError>;

    /// Route computation between two coordinates.
    async fn search_route(&self, query: &RouteQuery) -> Result<RouteResponse, GeocodeError>;
}
