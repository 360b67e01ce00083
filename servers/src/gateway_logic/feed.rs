use lib_common::{GatewayState, TelemetryFrame};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Drains the upstream frame channel into the gateway state until shutdown
/// or until the upstream publisher goes away.
pub async fn run(
    state: Arc<GatewayState>,
    mut frames_rx: mpsc::UnboundedReceiver<TelemetryFrame>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                log::info!("Feed task shutting down.");
                break;
            }
            frame = frames_rx.recv() => {
                let Some(frame) = frame else {
                    log::warn!("Upstream frame channel closed, feed task exiting.");
                    break;
                };
                state.handle_frame(frame).await;
            }
        }
    }
}
