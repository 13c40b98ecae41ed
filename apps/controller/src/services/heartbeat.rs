//! Periodic full-snapshot broadcast

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::websocket::ControllerSynchronizer;

/// Broadcast the snapshot every `interval` until cancelled
///
/// The first heartbeat goes out one interval after start; clients connecting
/// before then already got the snapshot in `connected`.
pub async fn run_heartbeat(
    sync: ControllerSynchronizer,
    interval: Duration,
    cancel: CancellationToken,
) {
    let start = tokio::time::Instant::now() + interval;
    let mut ticker = tokio::time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval_ms = interval.as_millis() as u64, "Heartbeat started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let reached = sync.broadcast_heartbeat();
                tracing::trace!(clients = reached, "Heartbeat sent");
            }
        }
    }

    tracing::info!("Heartbeat stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::websocket::ConnectionManager;
    use thermo_protocol::events;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_repeats_until_cancelled() {
        let config = Config {
            legacy_temp_ticks: false,
            ..Config::default()
        };
        let sync = ControllerSynchronizer::new(&config, ConnectionManager::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        sync.on_client_connected(Uuid::new_v4(), tx);
        assert_eq!(rx.recv().await.unwrap().event, events::CONNECTED);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_heartbeat(
            sync.clone(),
            Duration::from_secs(2),
            cancel.clone(),
        ));

        for _ in 0..3 {
            assert_eq!(rx.recv().await.unwrap().event, events::STATUS_HEARTBEAT);
        }

        cancel.cancel();
        task.await.unwrap();
    }
}
