//! Upstream connection lifecycle against local fixture servers: the full
//! session-cookie handshake into streaming, and the bounded reconnect
//! policy when the provider keeps refusing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use lib_common::{ClientState, TelemetryClient, TelemetryConfig};
use tokio::sync::mpsc;

async fn wait_for<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// Fixture that always refuses the session handshake.
async fn spawn_refusing_server(hits: Arc<AtomicUsize>) -> String {
    let app = Router::new()
        .route(
            "/api/session",
            post(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::UNAUTHORIZED
            }),
        )
        .with_state(hits);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn gives_up_after_the_attempt_cap() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_refusing_server(hits.clone()).await;

    let (frames_tx, _frames_rx) = mpsc::unbounded_channel();
    let client = TelemetryClient::new(
        TelemetryConfig {
            reconnect_delay: Duration::from_millis(50),
            max_attempts: 3,
            ..TelemetryConfig::new(&base_url, "user@example.com", "secret")
        },
        frames_tx,
    );

    client.initialize();

    assert!(
        wait_for(|| client.state() == ClientState::GivenUp, Duration::from_secs(5)).await,
        "client never gave up"
    );
    assert_eq!(client.attempts(), 3);
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    // No further attempts happen on their own once given up.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn initialize_restarts_a_given_up_client() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_refusing_server(hits.clone()).await;

    let (frames_tx, _frames_rx) = mpsc::unbounded_channel();
    let client = TelemetryClient::new(
        TelemetryConfig {
            reconnect_delay: Duration::from_millis(20),
            max_attempts: 2,
            ..TelemetryConfig::new(&base_url, "user@example.com", "secret")
        },
        frames_tx,
    );

    client.initialize();
    assert!(wait_for(|| client.state() == ClientState::GivenUp, Duration::from_secs(5)).await);
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    client.initialize();
    assert!(
        wait_for(|| hits.load(Ordering::SeqCst) >= 3, Duration::from_secs(5)).await,
        "restart never reached the provider"
    );

    client.shutdown();
}

/// Fixture that authenticates any credentials and streams one frame over
/// the socket, provided the session cookie comes back in the handshake.
async fn spawn_streaming_server() -> String {
    async fn session() -> impl IntoResponse {
        (
            [(header::SET_COOKIE, "JSESSIONID=fixture-session; Path=/")],
            StatusCode::OK,
        )
    }

    async fn socket(headers: HeaderMap, ws: WebSocketUpgrade) -> axum::response::Response {
        let cookie_ok = headers
            .get(header::COOKIE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.contains("JSESSIONID=fixture-session"))
            .unwrap_or(false);
        if !cookie_ok {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        ws.on_upgrade(stream_one_frame).into_response()
    }

    async fn stream_one_frame(mut socket: WebSocket) {
        let frame = serde_json::json!({
            "positions": [{
                "id": 55,
                "deviceId": 9,
                "latitude": 37.98,
                "longitude": 23.73,
                "speed": 5.0,
                "valid": true
            }]
        });
        let _ = socket.send(Message::Text(frame.to_string().into())).await;
        // Keep the socket open briefly so the client reads the frame.
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    let app = Router::new()
        .route("/api/session", post(session))
        .route("/api/socket", get(socket));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn authenticates_and_streams_frames() {
    let base_url = spawn_streaming_server().await;

    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();
    let client = TelemetryClient::new(
        TelemetryConfig::new(&base_url, "user@example.com", "secret"),
        frames_tx,
    );

    client.initialize();

    let frame = tokio::time::timeout(Duration::from_secs(5), frames_rx.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("frame channel closed");

    let positions = frame.positions.expect("frame carried no positions");
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].device_id, 9);
    assert_eq!(positions[0].speed, Some(5.0));

    client.shutdown();
    assert!(
        wait_for(|| client.state() == ClientState::Idle, Duration::from_secs(5)).await,
        "client never wound down"
    );
}
