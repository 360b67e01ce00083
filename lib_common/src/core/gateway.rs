//! # Gateway Fan-out State
//!
//! Shared state of the client-facing gateway: the subscription registry plus
//! one outbound channel per connected client, and the frame handler that
//! routes upstream batches to exactly the clients subscribed to each device.
//!
//! Delivery is best-effort and at-most-once: a client that disconnected
//! mid-frame is silently skipped (its channel send is a harmless no-op),
//! and nothing is replayed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::core::enrich::enrich_position;
use crate::core::registry::SubscriptionRegistry;
use crate::geocode::GeocodeService;
use crate::models::{Device, Position, TelemetryEvent, TelemetryFrame};
use crate::retrieve::DeviceDirectory;

/// Inbound message from a browser client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    pub subscribe_to_device: Option<i64>,
    pub unsubscribe_from_device: Option<i64>,
}

/// Outbound message to a browser client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    SubscriptionConfirmed { device_id: i64 },
    #[serde(rename_all = "camelCase")]
    UnsubscriptionConfirmed { device_id: i64 },
    PositionUpdate(Position),
    DeviceUpdate(Device),
    EventUpdate(TelemetryEvent),
    Error { message: String },
}

/// The gateway's shared state. One instance per process, shared by every
/// client task and the upstream feed task.
pub struct GatewayState {
    registry: SubscriptionRegistry,
    clients: Mutex<HashMap<u64, mpsc::UnboundedSender<ServerMessage>>>,
    next_client_id: AtomicU64,
    directory: Arc<dyn DeviceDirectory>,
    geocoder: Arc<GeocodeService>,
}

impl GatewayState {
    /// Creates the state with its collaborators.
    pub fn new(directory: Arc<dyn DeviceDirectory>, geocoder: Arc<GeocodeService>) -> Self {
        Self {
            registry: SubscriptionRegistry::new(),
            clients: Mutex::new(HashMap::new()),
            next_client_id: AtomicU64::new(1),
            directory,
            geocoder,
        }
    }

    /// Registers a new client connection, returning its id and the receiver
    /// its socket task drains.
    pub fn add_client(&self) -> (u64, mpsc::UnboundedReceiver<ServerMessage>) {
        let client_id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut clients = self.clients.lock().expect("Gateway clients lock poisoned");
        clients.insert(client_id, tx);
        log::info!("Client {} connected", client_id);
        (client_id, rx)
    }

    /// Removes a disconnecting client: drops its channel and scrubs it from
    /// every subscriber set, synchronously, before returning.
    pub fn remove_client(&self, client_id: u64) {
        {
            let mut clients = self.clients.lock().expect("Gateway clients lock poisoned");
            clients.remove(&client_id);
        }
        self.registry.remove_client(client_id);
        log::info!("Client {} disconnected", client_id);
    }

    /// Number of currently connected clients.
    pub fn client_count(&self) -> usize {
        self.clients
            .lock()
            .expect("Gateway clients lock poisoned")
            .len()
    }

    /// Devices currently having at least one subscriber.
    pub fn tracked_devices(&self) -> Vec<i64> {
        self.registry.tracked_devices()
    }

    fn send_to(&self, client_id: u64, message: ServerMessage) {
        let clients = self.clients.lock().expect("Gateway clients lock poisoned");
        if let Some(tx) = clients.get(&client_id) {
            // A closed channel means the socket task is tearing down; the
            // registry scan in remove_client will catch up.
            let _ = tx.send(message);
        }
    }

    /// Handles `subscribeToDevice`: validates the device against the
    /// directory, registers the subscription, confirms, then best-effort
    /// pushes the latest known position.
    pub async fn subscribe_to_device(&self, client_id: u64, device_id: i64) {
        log::info!("Client {} subscribing to device {}", client_id, device_id);

        if let Err(err) = self.directory.get_device_by_id(device_id).await {
            log::error!("Error subscribing to device {}: {}", device_id, err);
            self.send_to(
                client_id,
                ServerMessage::Error {
                    message: format!("Failed to subscribe to device {}", device_id),
                },
            );
            return;
        }

        self.registry.subscribe(device_id, client_id);
        self.send_to(client_id, ServerMessage::SubscriptionConfirmed { device_id });

        match self.directory.latest_position(device_id).await {
            Ok(Some(mut position)) => {
                enrich_position(&self.geocoder, &mut position).await;
                self.send_to(client_id, ServerMessage::PositionUpdate(position));
            }
            Ok(None) => {
                log::error!("No position data available for device {}", device_id);
            }
            Err(err) => {
                log::error!("Error fetching latest position for device {}: {}", device_id, err);
            }
        }
    }

    /// Handles `unsubscribeFromDevice`. The confirmation is only sent when
    /// the client actually held a subscription for the device.
    pub fn unsubscribe_from_device(&self, client_id: u64, device_id: i64) {
        log::info!("Client {} unsubscribing from device {}", client_id, device_id);
        if self.registry.unsubscribe(device_id, client_id) {
            self.send_to(
                client_id,
                ServerMessage::UnsubscriptionConfirmed { device_id },
            );
        }
    }

    /// Routes one upstream frame: each batch is filtered to devices with
    /// subscribers, positions are enriched individually and sequentially,
    /// and every surviving entry is delivered to its subscriber set in the
    /// frame's arrival order.
    pub async fn handle_frame(&self, frame: TelemetryFrame) {
        if let Some(positions) = frame.positions {
            self.broadcast_positions(positions).await;
        }
        if let Some(devices) = frame.devices {
            self.broadcast_devices(devices);
        }
        if let Some(events) = frame.events {
            self.broadcast_events(events);
        }
    }

    async fn broadcast_positions(&self, positions: Vec<Position>) {
        for mut position in positions {
            let subscribers = self.registry.subscribers_of(position.device_id);
            if subscribers.is_empty() {
                continue;
            }
            // Enrichment failure costs this position its address, never the
            // rest of the batch.
            enrich_position(&self.geocoder, &mut position).await;
            for client_id in subscribers {
                self.send_to(client_id, ServerMessage::PositionUpdate(position.clone()));
            }
        }
    }

    fn broadcast_devices(&self, devices: Vec<Device>) {
        for device in devices {
            for client_id in self.registry.subscribers_of(device.id) {
                self.send_to(client_id, ServerMessage::DeviceUpdate(device.clone()));
            }
        }
    }

    fn broadcast_events(&self, events: Vec<TelemetryEvent>) {
        for event in events {
            for client_id in self.registry.subscribers_of(event.device_id) {
                self.send_to(client_id, ServerMessage::EventUpdate(event.clone()));
            }
        }
    }
}
