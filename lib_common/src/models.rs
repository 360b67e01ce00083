//! # Provider Data Model
//!
//! Typed records for the JSON frames emitted by the tracking provider's
//! streaming socket and REST API. The stream envelope is a tagged union of
//! optional arrays: a frame may carry positions, device state changes,
//! events, or any combination of the three.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One position sample for a tracked device.
///
/// `address` is populated by the enrichment pipeline when absent; `speed`
/// arrives in knots and is normalized to km/h before delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Position {
    pub id: i64,
    pub device_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_time: Option<String>,
    pub outdated: bool,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub geofence_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub attributes: Value,
}

/// A tracked device as reported by the provider's device directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Device {
    pub id: i64,
    pub name: String,
    pub unique_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub attributes: Value,
}

/// A provider-side event (geofence enter/exit, ignition, alarm, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetryEvent {
    pub id: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub device_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geofence_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_time: Option<String>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub attributes: Value,
}

/// Envelope for one inbound streaming frame.
///
/// Each of the three arrays is optional; unknown fields are ignored so a
/// provider upgrade cannot break frame parsing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryFrame {
    pub positions: Option<Vec<Position>>,
    pub devices: Option<Vec<Device>>,
    pub events: Option<Vec<TelemetryEvent>>,
}

impl TelemetryFrame {
    /// True when the frame carries no payload at all.
    pub fn is_empty(&self) -> bool {
        self.positions.is_none() && self.devices.is_none() && self.events.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_decodes_positions_and_ignores_unknown_fields() {
        let raw = r#"{
            "positions": [
                {"id": 7, "deviceId": 42, "latitude": 41.0, "longitude": 29.0, "speed": 10.0}
            ],
            "somethingNew": true
        }"#;
        let frame: TelemetryFrame = serde_json::from_str(raw).unwrap();
        let positions = frame.positions.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].device_id, 42);
        assert_eq!(positions[0].speed, Some(10.0));
        assert!(frame.devices.is_none());
        assert!(frame.events.is_none());
    }

    #[test]
    fn frame_decodes_mixed_batches() {
        let raw = r#"{
            "devices": [{"id": 42, "name": "truck-1", "uniqueId": "IMEI42"}],
            "events": [{"id": 1, "type": "geofenceEnter", "deviceId": 42}]
        }"#;
        let frame: TelemetryFrame = serde_json::from_str(raw).unwrap();
        assert!(frame.positions.is_none());
        assert_eq!(frame.devices.as_ref().unwrap()[0].unique_id, "IMEI42");
        assert_eq!(frame.events.as_ref().unwrap()[0].event_type, "geofenceEnter");
    }

    #[test]
    fn empty_frame_is_empty() {
        let frame: TelemetryFrame = serde_json::from_str("{}").unwrap();
        assert!(frame.is_empty());
    }
}
