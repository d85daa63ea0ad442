// src/health.rs
use crate::api::Backend;
use crate::models::HealthStatus;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Probes `/health` immediately and then on every interval.
pub fn spawn_monitor(
    backend: Arc<dyn Backend>,
    interval: Duration,
) -> (JoinHandle<()>, watch::Receiver<HealthStatus>) {
    let (status_tx, status_rx) = watch::channel(HealthStatus::Loading);

    let handle = tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let status = backend.health().await;
            let previous = status_tx.send_replace(status);
            if previous != status {
                info!("API status changed: {} -> {}", previous, status);
            }
        }
    });

    (handle, status_rx)
}
