//! # Upstream Telemetry Client
//!
//! Maintains the single live connection to the tracking provider: exchanges
//! credentials for a session cookie, opens the streaming websocket with that
//! cookie, hands every parsed frame to the gateway through one outbound
//! channel, and reconnects with a fixed delay on failure.
//!
//! After `max_attempts` consecutive failures without an intervening
//! streaming period the client parks in `GivenUp` and stays there until an
//! explicit `initialize()` restarts the cycle. This fail-stop is deliberate:
//! it avoids an infinite silent retry loop and leaves the decision to a
//! supervisor or operator.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail};
use futures_util::StreamExt;
use http::Uri;
use reqwest::header::{ACCEPT, SET_COOKIE};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::models::TelemetryFrame;

/// Connection settings for the tracking provider.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Provider root URL, e.g. "https://tracker.example.com".
    pub base_url: String,
    /// Account email used for session establishment.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Fixed delay between reconnect attempts. Deliberately not exponential:
    /// the attempt cap bounds the total retry window instead.
    pub reconnect_delay: Duration,
    /// Consecutive failures tolerated before parking in `GivenUp`.
    pub max_attempts: u32,
}

impl TelemetryConfig {
    /// Settings with the default reconnect policy (5 s delay, 5 attempts).
    pub fn new(base_url: &str, username: &str, password: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            reconnect_delay: Duration::from_secs(5),
            max_attempts: 5,
        }
    }
}

/// Observable connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No cycle running.
    Idle,
    /// Exchanging credentials for a session cookie.
    Authenticating,
    /// Opening the streaming websocket.
    Connecting,
    /// Live and forwarding frames.
    Streaming,
    /// Sleeping out the fixed delay before the next attempt.
    BackoffWait,
    /// Attempt cap reached; waiting for an external `initialize()`.
    GivenUp,
}

/// The resilient streaming client. Owns at most one live socket at a time.
pub struct TelemetryClient {
    config: TelemetryConfig,
    http: reqwest::Client,
    frames_tx: mpsc::UnboundedSender<TelemetryFrame>,
    state: Arc<Mutex<ClientState>>,
    attempts: Arc<AtomicU32>,
    cancel: Mutex<CancellationToken>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryClient {
    /// Creates the client. Frames stream into `frames_tx` in transport
    /// order, unbuffered; the receiving half is the single consumer.
    pub fn new(config: TelemetryConfig, frames_tx: mpsc::UnboundedSender<TelemetryFrame>) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            frames_tx,
            state: Arc::new(Mutex::new(ClientState::Idle)),
            attempts: Arc::new(AtomicU32::new(0)),
            cancel: Mutex::new(CancellationToken::new()),
            task: Mutex::new(None),
        }
    }

    /// Starts the connection cycle. A no-op (with a warning) while a cycle
    /// task is still alive; after `GivenUp` or `shutdown()` it starts fresh.
    pub fn initialize(&self) {
        let mut task = self.task.lock().expect("Telemetry task lock poisoned");
        if let Some(handle) = task.as_ref() {
            if !handle.is_finished() {
                log::warn!("Telemetry connection already initialized");
                return;
            }
        }

        let token = CancellationToken::new();
        *self.cancel.lock().expect("Telemetry cancel lock poisoned") = token.clone();
        self.attempts.store(0, Ordering::Relaxed);

        *task = Some(tokio::spawn(run_cycle(
            self.config.clone(),
            self.http.clone(),
            self.frames_tx.clone(),
            self.state.clone(),
            self.attempts.clone(),
            token,
        )));
    }

    /// Tears the connection down: cancels the cycle, which closes any live
    /// socket promptly and aborts a pending backoff timer.
    pub fn shutdown(&self) {
        log::info!("Closing telemetry connection");
        self.cancel
            .lock()
            .expect("Telemetry cancel lock poisoned")
            .cancel();
    }

    /// Snapshot of the connection state.
    pub fn state(&self) -> ClientState {
        *self.state.lock().expect("Telemetry state lock poisoned")
    }

    /// Consecutive failures since the last streaming period.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }
}

fn set_state(state: &Arc<Mutex<ClientState>>, next: ClientState) {
    let mut current = state.lock().expect("Telemetry state lock poisoned");
    if *current != next {
        log::debug!("Telemetry connection {:?} -> {:?}", *current, next);
        *current = next;
    }
}

/// Rewrites the provider's HTTP base URL into its streaming endpoint.
fn streaming_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = trimmed.strip_prefix("https") {
        format!("wss{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix("http") {
        format!("ws{}", rest)
    } else {
        trimmed.to_string()
    };
    format!("{}/api/socket", ws_base)
}

/// One full connection cycle: authenticate, stream, back off, repeat until
/// cancelled, the consumer goes away, or the attempt cap is hit.
async fn run_cycle(
    config: TelemetryConfig,
    http: reqwest::Client,
    frames_tx: mpsc::UnboundedSender<TelemetryFrame>,
    state: Arc<Mutex<ClientState>>,
    attempts: Arc<AtomicU32>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            set_state(&state, ClientState::Idle);
            return;
        }

        set_state(&state, ClientState::Authenticating);
        let connected = match authenticate(&config, &http).await {
            Ok(session_cookie) => {
                set_state(&state, ClientState::Connecting);
                match open_stream(&config, &session_cookie).await {
                    Ok(ws_stream) => {
                        set_state(&state, ClientState::Streaming);
                        // A successful connection forgives prior failures.
                        attempts.store(0, Ordering::Relaxed);
                        match stream_frames(ws_stream, &frames_tx, &cancel).await {
                            StreamEnd::Cancelled => {
                                set_state(&state, ClientState::Idle);
                                return;
                            }
                            StreamEnd::ConsumerGone => {
                                log::warn!("Frame consumer dropped; stopping telemetry client");
                                set_state(&state, ClientState::Idle);
                                return;
                            }
                            StreamEnd::Failed => false,
                        }
                    }
                    Err(err) => {
                        log::error!("Failed to connect to provider stream: {}", err);
                        false
                    }
                }
            }
            Err(err) => {
                log::error!("Error establishing session: {}", err);
                false
            }
        };

        if !connected {
            let failed = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            if failed >= config.max_attempts {
                log::error!(
                    "Max reconnection attempts ({}) reached. Giving up.",
                    config.max_attempts
                );
                set_state(&state, ClientState::GivenUp);
                return;
            }
            log::info!(
                "Scheduling reconnect attempt {} in {}ms",
                failed,
                config.reconnect_delay.as_millis()
            );
            set_state(&state, ClientState::BackoffWait);
            tokio::select! {
                _ = cancel.cancelled() => {
                    set_state(&state, ClientState::Idle);
                    return;
                }
                _ = sleep(config.reconnect_delay) => {}
            }
        }
    }
}

/// Exchanges credentials for the provider's session cookie.
async fn authenticate(config: &TelemetryConfig, http: &reqwest::Client) -> anyhow::Result<String> {
    let url = format!("{}/api/session", config.base_url.trim_end_matches('/'));
    let response = http
        .post(&url)
        .header(ACCEPT, "application/json")
        .form(&[
            ("email", config.username.as_str()),
            ("password", config.password.as_str()),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        bail!("session endpoint returned status {}", response.status());
    }

    for cookie in response.headers().get_all(SET_COOKIE) {
        if let Ok(value) = cookie.to_str() {
            if value.starts_with("JSESSIONID") {
                if let Some(pair) = value.split(';').next() {
                    return Ok(pair.to_string());
                }
            }
        }
    }
    bail!("session cookie not found")
}

/// Opens the streaming websocket, presenting the session cookie in the
/// handshake.
async fn open_stream(
    config: &TelemetryConfig,
    session_cookie: &str,
) -> anyhow::Result<WebSocketStream<MaybeTlsStream<TcpStream>>> {
    let ws_url = streaming_url(&config.base_url);
    log::debug!("Streaming URL: {}", ws_url);

    let uri = ws_url.parse::<Uri>()?;
    let host = uri
        .authority()
        .map(|authority| authority.as_str().to_string())
        .ok_or_else(|| anyhow!("streaming URL has no host"))?;

    let request = http::Request::builder()
        .method("GET")
        .uri(uri)
        .header("Host", host)
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Version", "13")
        .header("Sec-WebSocket-Key", generate_key())
        .header("Cookie", session_cookie)
        .body(())?;

    let (ws_stream, _) = connect_async(request).await?;
    log::info!("Connected to provider streaming socket");
    Ok(ws_stream)
}

enum StreamEnd {
    /// Transport error or remote close; the cycle should back off and retry.
    Failed,
    /// Teardown requested.
    Cancelled,
    /// The frame channel's receiver was dropped.
    ConsumerGone,
}

/// Forwards frames until the stream dies or teardown is requested. Frames
/// are delivered verbatim in transport order; unparseable ones are logged
/// and dropped.
async fn stream_frames(
    mut ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    frames_tx: &mpsc::UnboundedSender<TelemetryFrame>,
    cancel: &CancellationToken,
) -> StreamEnd {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws_stream.close(None).await;
                return StreamEnd::Cancelled;
            }
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<TelemetryFrame>(&text) {
                            Ok(frame) => {
                                if frames_tx.send(frame).is_err() {
                                    return StreamEnd::ConsumerGone;
                                }
                            }
                            Err(err) => {
                                log::warn!("Discarding unparseable frame: {}", err);
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {}
                    Some(Ok(WsMessage::Close(frame))) => {
                        log::info!("Stream closed by provider: {:?}", frame);
                        return StreamEnd::Failed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        log::error!("Stream read error: {}", err);
                        return StreamEnd::Failed;
                    }
                    None => {
                        log::warn!("Stream ended by remote host");
                        return StreamEnd::Failed;
                    }
                }
            }
        }
    }
}
