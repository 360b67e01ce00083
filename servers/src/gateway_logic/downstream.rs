use crate::gateway_logic::config::Settings;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::HeaderValue,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::StreamExt;
use lib_common::{ClientMessage, GatewayState, ServerMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

pub async fn run(
    settings: Settings,
    state: Arc<GatewayState>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let cors = if settings.cors_allowed_origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = settings
            .cors_allowed_origins
            .iter()
            .filter_map(|origin| origin.parse::<HeaderValue>().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    log::info!("Downstream server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            log::error!("Failed to bind {}: {}", addr, err);
            return;
        }
    };

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.recv().await.ok();
            log::info!("Downstream server shutting down.");
        })
        .await
    {
        log::error!("Downstream server error: {}", err);
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn health_handler() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "OK")
}

async fn handle_socket(mut socket: WebSocket, state: Arc<GatewayState>) {
    let (client_id, mut outbound_rx) = state.add_client();

    loop {
        tokio::select! {
            // Handle incoming messages from the client
            incoming = socket.next() => {
                let Some(Ok(msg)) = incoming else {
                    // client disconnected
                    break;
                };
                match msg {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if let Some(device_id) = client_msg.subscribe_to_device {
                                    state.subscribe_to_device(client_id, device_id).await;
                                }
                                if let Some(device_id) = client_msg.unsubscribe_from_device {
                                    state.unsubscribe_from_device(client_id, device_id);
                                }
                            }
                            Err(err) => {
                                log::warn!("Client {} sent a malformed message: {}", client_id, err);
                                let reply = ServerMessage::Error {
                                    message: "Invalid message format".to_string(),
                                };
                                if let Ok(json_str) = serde_json::to_string(&reply) {
                                    if socket.send(Message::Text(json_str.into())).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                    Message::Close(_) => {
                        break;
                    }
                    _ => {}
                }
            }
            // Drain the gateway's outbound queue for this client
            outbound = outbound_rx.recv() => {
                let Some(server_msg) = outbound else {
                    break;
                };
                match serde_json::to_string(&server_msg) {
                    Ok(json_str) => {
                        if socket.send(Message::Text(json_str.into())).await.is_err() {
                            break; // client disconnected
                        }
                    }
                    Err(err) => {
                        log::error!("Failed to serialize outbound message for client {}: {}", client_id, err);
                    }
                }
            }
        }
    }

    state.remove_client(client_id);
}
