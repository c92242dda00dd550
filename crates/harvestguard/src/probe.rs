//! Periodic server reachability probe.
//!
//! Advisory only: the latest reading gates the submit action of a scan form,
//! but a request that races past an `Online` reading can still fail.

use crate::api::ApiClient;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

const MIN_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    /// No reading yet.
    Checking,
    Online,
    Offline,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServerStatus::Checking => "Checking...",
            ServerStatus::Online => "Online",
            ServerStatus::Offline => "Offline",
        })
    }
}

/// Background task polling the health endpoint on a fixed interval.
/// The task is aborted when the probe is dropped.
pub struct StatusProbe {
    rx: watch::Receiver<ServerStatus>,
    handle: JoinHandle<()>,
}

impl StatusProbe {
    /// Start probing immediately, then every `interval`. Must be called inside a tokio runtime.
    pub fn spawn(client: Arc<ApiClient>, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(ServerStatus::Checking);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let status = client.check_status().await;
                let previous = tx.send_replace(status);
                if previous != status {
                    info!(%status, "server status changed");
                }
            }
        });
        Self { rx, handle }
    }

    /// Latest reading.
    pub fn current(&self) -> ServerStatus {
        *self.rx.borrow()
    }

    /// Receiver for forms and watchers.
    pub fn subscribe(&self) -> watch::Receiver<ServerStatus> {
        self.rx.clone()
    }

    /// Wait for the first completed check.
    pub async fn first_reading(&self) -> ServerStatus {
        let mut rx = self.rx.clone();
        let status = match rx.wait_for(|s| *s != ServerStatus::Checking).await {
            Ok(status) => *status,
            Err(_) => ServerStatus::Offline,
        };
        status
    }
}

impl Drop for StatusProbe {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
