//! # Tracking Provider REST Client
//!
//! Typed client for the provider's REST API, authenticated with basic auth.
//! The gateway uses it as the device directory (validating subscriptions)
//! and for last-known-position lookups; history reads come from here too,
//! since positions are never stored locally.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Method;

use crate::error::ProviderError;
use crate::models::{Device, Position};
use crate::retrieve::ky_http::ApiClient;
use crate::utils::normalize_position_timestamps;

/// Default history window when the caller gives no `from` bound.
const DEFAULT_HISTORY_DAYS: i64 = 10;

/// Two history samples within this delta on both axes are considered the
/// same stop and deduplicated.
const HISTORY_DEDUP_DEG: f64 = 0.0001;

/// Synchronous device lookup boundary used to validate subscriptions, plus
/// the best-effort last-position read pushed on subscribe.
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Resolves a device by its provider id.
    async fn get_device_by_id(&self, id: i64) -> Result<Device, ProviderError>;
    /// The most recent known position for a device, if any.
    async fn latest_position(&self, device_id: i64) -> Result<Option<Position>, ProviderError>;
}

/// The provider REST API client.
pub struct TraccarApi {
    client: ApiClient,
}

impl TraccarApi {
    /// Builds a client for the provider's `/api` surface.
    ///
    /// # Arguments
    /// * `base_url` - provider root, e.g. "https://tracker.example.com".
    /// * `username` / `password` - basic-auth credentials.
    pub fn new(base_url: &str, username: &str, password: &str) -> anyhow::Result<Self> {
        let api_root = format!("{}/api/", base_url.trim_end_matches('/'));
        let client = ApiClient::new(&api_root)?.with_basic_auth(username, password);
        log::info!("Provider API client initialized for {}", api_root);
        Ok(Self { client })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let response = self
            .client
            .request::<T, ()>(Method::GET, path, None, None)
            .await
            .map_err(ProviderError::Transport)?;

        if response.success {
            response.data.ok_or_else(|| ProviderError::Status {
                status: response.status,
                body: "empty response body".to_string(),
            })
        } else if response.status == 404 {
            Err(ProviderError::NotFound)
        } else {
            Err(ProviderError::Status {
                status: response.status,
                body: response.error_body.unwrap_or_default(),
            })
        }
    }

    /// All devices visible to the configured account.
    pub async fn get_all_devices(&self) -> Result<Vec<Device>, ProviderError> {
        self.get("devices").await
    }

    /// Recent positions for a device, newest first, optionally limited.
    pub async fn get_positions_by_device(
        &self,
        device_id: i64,
        limit: Option<u32>,
    ) -> Result<Vec<Position>, ProviderError> {
        let path = match limit {
            Some(limit) => format!("positions?deviceId={}&limit={}", device_id, limit),
            None => format!("positions?deviceId={}", device_id),
        };
        let mut positions: Vec<Position> = self.get(&path).await?;
        for position in &mut positions {
            normalize_position_timestamps(position);
        }
        Ok(positions)
    }

    /// Position history for a device within a time window. Bounds default to
    /// the last ten days / now. Samples around the same location (within
    /// roughly ten meters on both axes) are collapsed to their first
    /// occurrence.
    pub async fn get_positions_in_range(
        &self,
        device_id: i64,
        from: Option<String>,
        to: Option<String>,
    ) -> Result<Vec<Position>, ProviderError> {
        let from = from
            .unwrap_or_else(|| (Utc::now() - Duration::days(DEFAULT_HISTORY_DAYS)).to_rfc3339());
        let to = to.unwrap_or_else(|| Utc::now().to_rfc3339());
        let path = format!("positions?deviceId={}&from={}&to={}", device_id, from, to);
        let positions: Vec<Position> = self.get(&path).await?;
        Ok(dedup_nearby(positions))
    }
}

/// Keeps the first sample of every near-identical location cluster,
/// preserving order.
fn dedup_nearby(positions: Vec<Position>) -> Vec<Position> {
    let mut kept: Vec<Position> = Vec::with_capacity(positions.len());
    for position in positions {
        let duplicate = kept.iter().any(|seen| {
            match (seen.latitude, seen.longitude, position.latitude, position.longitude) {
                (Some(seen_lat), Some(seen_lon), Some(lat), Some(lon)) => {
                    (seen_lat - lat).abs() < HISTORY_DEDUP_DEG
                        && (seen_lon - lon).abs() < HISTORY_DEDUP_DEG
                }
                _ => false,
            }
        });
        if !duplicate {
            kept.push(position);
        }
    }
    kept
}

#[async_trait]
impl DeviceDirectory for TraccarApi {
    async fn get_device_by_id(&self, id: i64) -> Result<Device, ProviderError> {
        self.get(&format!("devices/{}", id)).await
    }

    async fn latest_position(&self, device_id: i64) -> Result<Option<Position>, ProviderError> {
        let positions = self.get_positions_by_device(device_id, Some(1)).await?;
        Ok(positions.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(lat: f64, lon: f64) -> Position {
        Position {
            latitude: Some(lat),
            longitude: Some(lon),
            ..Position::default()
        }
    }

    #[test]
    fn dedup_collapses_nearby_samples() {
        let positions = vec![
            at(41.0, 29.0),
            at(41.00005, 29.00005), // same stop
            at(41.01, 29.01),       // clearly elsewhere
        ];
        let kept = dedup_nearby(positions);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].latitude, Some(41.0));
        assert_eq!(kept[1].latitude, Some(41.01));
    }

    #[test]
    fn dedup_keeps_positions_without_coordinates() {
        let kept = dedup_nearby(vec![Position::default(), Position::default()]);
        assert_eq!(kept.len(), 2);
    }
}
