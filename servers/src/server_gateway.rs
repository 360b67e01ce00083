use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;

use lib_common::{
    CacheBackend, CacheStore, GatewayState, GeocodeProvider, GeocodeService, MapboxClient,
    MemoryBackend, RedisBackend, TelemetryClient, TelemetryConfig, TraccarApi,
};

mod gateway_logic;
use gateway_logic::{config, downstream, feed, logger};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = config::load_config()?;
    logger::setup_logging(&settings.log_dir, &settings.log_level)?;

    // Geocoding cache: Redis when reachable, in-process otherwise
    let backend: Arc<dyn CacheBackend> = match RedisBackend::connect(&settings.redis_url).await {
        Ok(redis) => {
            log::info!("Connected to Redis at {}", settings.redis_url);
            Arc::new(redis)
        }
        Err(err) => {
            log::error!("Redis connection failed: {}. Falling back to the in-process cache.", err);
            Arc::new(MemoryBackend::new())
        }
    };
    let cache = CacheStore::new(backend);

    let mapbox = MapboxClient::new(&settings.mapbox_api_url, &settings.mapbox_access_token)
        .context("Failed to construct the Mapbox client")?;
    let provider: Arc<dyn GeocodeProvider> = Arc::new(mapbox);
    let geocoder = Arc::new(GeocodeService::new(cache, provider));

    let directory = Arc::new(TraccarApi::new(
        &settings.traccar_api_url,
        &settings.traccar_api_username,
        &settings.traccar_api_password,
    )?);

    let state = Arc::new(GatewayState::new(directory, geocoder));

    // Upstream telemetry feed
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let telemetry = Arc::new(TelemetryClient::new(
        TelemetryConfig {
            base_url: settings.traccar_api_url.clone(),
            username: settings.traccar_api_username.clone(),
            password: settings.traccar_api_password.clone(),
            reconnect_delay: Duration::from_millis(settings.reconnect_delay_ms),
            max_attempts: settings.max_reconnect_attempts,
        },
        frames_tx,
    ));
    telemetry.initialize();

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);

    let feed_handle = tokio::spawn(feed::run(
        state.clone(),
        frames_rx,
        shutdown_tx.subscribe(),
    ));

    let downstream_handle = tokio::spawn(downstream::run(
        settings.clone(),
        state.clone(),
        shutdown_tx.subscribe(),
    ));

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut term_signal) => {
                        term_signal.recv().await;
                        log::info!("SIGTERM received, initiating shutdown.");
                    }
                    Err(err) => {
                        log::error!("Failed to install SIGTERM handler: {}", err);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }

    // Send shutdown signal to all components
    let _ = shutdown_tx.send(());
    telemetry.shutdown();

    // Wait for components to shut down
    let _ = tokio::try_join!(feed_handle, downstream_handle);

    log::info!("Shutdown complete.");
    Ok(())
}
