//! # Mapbox Provider Client
//!
//! Implements the geocoding provider boundary against the Mapbox geocoding
//! and directions APIs, authenticated with an access token passed as a
//! query parameter.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;

use crate::error::GeocodeError;
use crate::geocode::{GeocodeProvider, Place, RouteQuery, RouteResponse};
use crate::retrieve::ky_http::ApiClient;

/// Raw Mapbox geocoding feature, mapped into a [`Place`].
#[derive(Debug, Deserialize)]
struct MapboxFeature {
    id: String,
    place_name: String,
    /// `[longitude, latitude]`
    center: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<MapboxFeature>,
}

/// Client for the Mapbox HTTP APIs.
pub struct MapboxClient {
    client: ApiClient,
    access_token: String,
}

impl MapboxClient {
    /// Builds a client.
    ///
    /// # Arguments
    /// * `api_url` - Mapbox API root, e.g. "https://api.mapbox.com".
    /// * `access_token` - the account access token.
    pub fn new(api_url: &str, access_token: &str) -> anyhow::Result<Self> {
        let client = ApiClient::new(api_url)?;
        Ok(Self {
            client,
            access_token: access_token.to_string(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, GeocodeError> {
        let response = self
            .client
            .request::<T, ()>(Method::GET, path, None, None)
            .await?;

        if response.success {
            response.data.ok_or_else(|| {
                GeocodeError::Transport(anyhow::anyhow!("empty response body"))
            })
        } else if response.status == 404 {
            Err(GeocodeError::NotFound)
        } else {
            Err(GeocodeError::Transport(anyhow::anyhow!(
                "geocoding provider returned status {}: {}",
                response.status,
                response.error_body.unwrap_or_default()
            )))
        }
    }

    fn places_from(collection: FeatureCollection) -> Vec<Place> {
        collection
            .features
            .into_iter()
            .filter_map(|feature| {
                // center is [longitude, latitude]
                let longitude = *feature.center.first()?;
                let latitude = *feature.center.get(1)?;
                Some(Place {
                    id: feature.id,
                    place_name: feature.place_name,
                    longitude,
                    latitude,
                })
            })
            .collect()
    }
}

#[async_trait]
impl GeocodeProvider for MapboxClient {
    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<Place>, GeocodeError> {
        let path = format!(
            "geocoding/v5/mapbox.places/{},{}.json?access_token={}",
            longitude, latitude, self.access_token
        );
        let collection: FeatureCollection = self.get(&path).await?;
        Ok(Self::places_from(collection))
    }

    async fn search_places(
        &self,
        query: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Place>, GeocodeError> {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let mut path = format!(
            "geocoding/v5/mapbox.places/{}.json?access_token={}",
            encoded, self.access_token
        );
        if let Some(limit) = limit {
            path.push_str(&format!("&limit={}", limit));
        }
        let collection: FeatureCollection = self.get(&path).await?;
        Ok(Self::places_from(collection))
    }

    async fn search_route(&self, query: &RouteQuery) -> Result<RouteResponse, GeocodeError> {
        let mut path = format!(
            "directions/v5/mapbox/driving/{},{};{},{}?access_token={}",
            query.start_longitude,
            query.start_latitude,
            query.end_longitude,
            query.end_latitude,
            self.access_token
        );
        if let Some(alternatives) = query.alternatives {
            path.push_str(&format!("&alternatives={}", alternatives));
        }
        if let Some(steps) = query.steps {
            path.push_str(&format!("&steps={}", steps));
        }
        if let Some(geometries) = &query.geometries {
            path.push_str(&format!("&geometries={}", geometries));
        }
        self.get(&path).await
    }
}
