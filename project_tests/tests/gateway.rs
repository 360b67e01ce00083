//! Fan-out semantics of the gateway state: delivery goes to exactly the
//! subscribers of each device, disconnects prune synchronously, and the
//! subscribe flow validates, confirms, then pushes the latest position.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lib_common::{
    CacheStore, Device, DeviceDirectory, GatewayState, GeocodeError, GeocodeProvider,
    GeocodeService, MemoryBackend, Place, Position, ProviderError, RouteQuery, RouteResponse,
    ServerMessage, TelemetryEvent, TelemetryFrame,
};

/// Directory stub backed by a fixed device map.
struct StubDirectory {
    devices: HashMap<i64, Device>,
    positions: HashMap<i64, Position>,
}

impl StubDirectory {
    fn new(device_ids: &[i64]) -> Self {
        let devices = device_ids
            .iter()
            .map(|&id| {
                (
                    id,
                    Device {
                        id,
                        name: format!("vehicle-{}", id),
                        unique_id: format!("unit-{}", id),
                        ..Default::default()
                    },
                )
            })
            .collect();
        Self {
            devices,
            positions: HashMap::new(),
        }
    }

    fn with_position(mut self, position: Position) -> Self {
        self.positions.insert(position.device_id, position);
        self
    }
}

#[async_trait]
impl DeviceDirectory for StubDirectory {
    async fn get_device_by_id(&self, id: i64) -> Result<Device, ProviderError> {
        self.devices.get(&id).cloned().ok_or(ProviderError::NotFound)
    }

    async fn latest_position(&self, device_id: i64) -> Result<Option<Position>, ProviderError> {
        Ok(self.positions.get(&device_id).cloned())
    }
}

/// Geocoder stub that knows no addresses.
struct NoAddresses;

#[async_trait]
impl GeocodeProvider for NoAddresses {
    async fn reverse_geocode(
        &self,
        _latitude: f64,
        _longitude: f64,
    ) -> Result<Vec<Place>, GeocodeError> {
        Ok(Vec::new())
    }

    async fn search_places(
        &self,
        _query: &str,
        _limit: Option<u32>,
    ) -> Result<Vec<Place>, GeocodeError> {
        Ok(Vec::new())
    }

    async fn search_route(&self, _query: &RouteQuery) -> Result<RouteResponse, GeocodeError> {
        Ok(RouteResponse::default())
    }
}

/// Geocoder stub whose provider is unreachable.
struct ProviderDown;

#[async_trait]
impl GeocodeProvider for ProviderDown {
    async fn reverse_geocode(
        &self,
        _latitude: f64,
        _longitude: f64,
    ) -> Result<Vec<Place>, GeocodeError> {
        Err(GeocodeError::Transport(anyhow::anyhow!("connection refused")))
    }

    async fn search_places(
        &self,
        _query: &str,
        _limit: Option<u32>,
    ) -> Result<Vec<Place>, GeocodeError> {
        Err(GeocodeError::Transport(anyhow::anyhow!("connection refused")))
    }

    async fn search_route(&self, _query: &RouteQuery) -> Result<RouteResponse, GeocodeError> {
        Err(GeocodeError::Transport(anyhow::anyhow!("connection refused")))
    }
}

fn gateway_with_provider(
    directory: StubDirectory,
    provider: Arc<dyn GeocodeProvider>,
) -> Arc<GatewayState> {
    let cache = CacheStore::new(Arc::new(MemoryBackend::new()));
    let geocoder = Arc::new(GeocodeService::new(cache, provider));
    Arc::new(GatewayState::new(Arc::new(directory), geocoder))
}

fn gateway_with(directory: StubDirectory) -> Arc<GatewayState> {
    gateway_with_provider(directory, Arc::new(NoAddresses))
}

fn position_for(device_id: i64) -> Position {
    Position {
        id: device_id * 100,
        device_id,
        latitude: Some(37.98),
        longitude: Some(23.73),
        valid: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn subscribe_confirms_then_pushes_latest_position() {
    let mut latest = position_for(1);
    latest.speed = Some(10.0);
    let state = gateway_with(StubDirectory::new(&[1]).with_position(latest));
    let (client_id, mut rx) = state.add_client();

    state.subscribe_to_device(client_id, 1).await;

    match rx.recv().await.unwrap() {
        ServerMessage::SubscriptionConfirmed { device_id } => assert_eq!(device_id, 1),
        other => panic!("expected confirmation, got {:?}", other),
    }
    match rx.recv().await.unwrap() {
        ServerMessage::PositionUpdate(position) => {
            assert_eq!(position.device_id, 1);
            // 10 knots is 18.52 km/h, rounded to 19.
            assert_eq!(position.speed, Some(19.0));
        }
        other => panic!("expected position push, got {:?}", other),
    }
    assert_eq!(state.tracked_devices(), vec![1]);
}

#[tokio::test]
async fn subscribe_to_unknown_device_reports_an_error() {
    let state = gateway_with(StubDirectory::new(&[]));
    let (client_id, mut rx) = state.add_client();

    state.subscribe_to_device(client_id, 42).await;

    match rx.recv().await.unwrap() {
        ServerMessage::Error { message } => {
            assert_eq!(message, "Failed to subscribe to device 42");
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert!(state.tracked_devices().is_empty());
}

#[tokio::test]
async fn positions_fan_out_only_to_subscribers() {
    let state = gateway_with(StubDirectory::new(&[1, 2]));
    let (alpha, mut alpha_rx) = state.add_client();
    let (beta, mut beta_rx) = state.add_client();

    state.subscribe_to_device(alpha, 1).await;
    state.subscribe_to_device(beta, 2).await;
    while alpha_rx.try_recv().is_ok() {}
    while beta_rx.try_recv().is_ok() {}

    state
        .handle_frame(TelemetryFrame {
            positions: Some(vec![position_for(1)]),
            ..Default::default()
        })
        .await;

    match alpha_rx.try_recv().unwrap() {
        ServerMessage::PositionUpdate(position) => assert_eq!(position.device_id, 1),
        other => panic!("expected position, got {:?}", other),
    }
    assert!(beta_rx.try_recv().is_err());
}

#[tokio::test]
async fn unsubscribe_confirms_and_stops_delivery() {
    let state = gateway_with(StubDirectory::new(&[1]));
    let (client_id, mut rx) = state.add_client();

    state.subscribe_to_device(client_id, 1).await;
    while rx.try_recv().is_ok() {}

    state.unsubscribe_from_device(client_id, 1);
    match rx.try_recv().unwrap() {
        ServerMessage::UnsubscriptionConfirmed { device_id } => assert_eq!(device_id, 1),
        other => panic!("expected unsubscription confirmation, got {:?}", other),
    }

    state
        .handle_frame(TelemetryFrame {
            positions: Some(vec![position_for(1)]),
            ..Default::default()
        })
        .await;

    assert!(rx.try_recv().is_err());
    assert!(state.tracked_devices().is_empty());
}

#[tokio::test]
async fn unsubscribe_without_subscription_sends_nothing() {
    let state = gateway_with(StubDirectory::new(&[1]));
    let (client_id, mut rx) = state.add_client();

    state.unsubscribe_from_device(client_id, 1);

    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn geocoder_outage_still_delivers_the_whole_batch() {
    let state = gateway_with_provider(StubDirectory::new(&[1, 2]), Arc::new(ProviderDown));
    let (client_id, mut rx) = state.add_client();

    state.subscribe_to_device(client_id, 1).await;
    state.subscribe_to_device(client_id, 2).await;
    while rx.try_recv().is_ok() {}

    state
        .handle_frame(TelemetryFrame {
            positions: Some(vec![position_for(1), position_for(2)]),
            ..Default::default()
        })
        .await;

    // Both positions arrive, address-less; the first failure does not
    // abort its sibling.
    for expected_device in [1, 2] {
        match rx.try_recv().unwrap() {
            ServerMessage::PositionUpdate(position) => {
                assert_eq!(position.device_id, expected_device);
                assert!(position.address.is_none());
            }
            other => panic!("expected position, got {:?}", other),
        }
    }
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn disconnect_scrubs_every_subscription() {
    let state = gateway_with(StubDirectory::new(&[1, 2]));
    let (client_id, mut rx) = state.add_client();

    state.subscribe_to_device(client_id, 1).await;
    state.subscribe_to_device(client_id, 2).await;
    while rx.try_recv().is_ok() {}

    state.remove_client(client_id);

    assert!(state.tracked_devices().is_empty());
    assert_eq!(state.client_count(), 0);

    // Delivery after the disconnect is a silent no-op.
    state
        .handle_frame(TelemetryFrame {
            positions: Some(vec![position_for(1), position_for(2)]),
            ..Default::default()
        })
        .await;
}

#[tokio::test]
async fn device_and_event_updates_route_by_device_id() {
    let state = gateway_with(StubDirectory::new(&[7]));
    let (client_id, mut rx) = state.add_client();

    state.subscribe_to_device(client_id, 7).await;
    while rx.try_recv().is_ok() {}

    state
        .handle_frame(TelemetryFrame {
            devices: Some(vec![Device {
                id: 7,
                name: "vehicle-7".to_string(),
                status: Some("online".to_string()),
                ..Default::default()
            }]),
            events: Some(vec![
                TelemetryEvent {
                    id: 900,
                    event_type: "geofenceEnter".to_string(),
                    device_id: 7,
                    ..Default::default()
                },
                TelemetryEvent {
                    id: 901,
                    event_type: "ignitionOn".to_string(),
                    device_id: 8,
                    ..Default::default()
                },
            ]),
            ..Default::default()
        })
        .await;

    match rx.try_recv().unwrap() {
        ServerMessage::DeviceUpdate(device) => assert_eq!(device.status.as_deref(), Some("online")),
        other => panic!("expected device update, got {:?}", other),
    }
    match rx.try_recv().unwrap() {
        ServerMessage::EventUpdate(event) => assert_eq!(event.id, 900),
        other => panic!("expected event update, got {:?}", other),
    }
    // The device 8 event had no subscriber.
    assert!(rx.try_recv().is_err());
}
