//! Network Monitoring Implementation
//!
//! Desktop hosts have no portable push API for link changes, so the monitor
//! probes once to answer the first query and afterwards relies on the host
//! shell reporting transitions through [`DesktopNetworkMonitor::report`].

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

const DEFAULT_PROBE_ADDR: &str = "1.1.1.1:443";
const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Desktop network monitor implementation
pub struct DesktopNetworkMonitor {
    probe_addr: String,
    probe_timeout: Duration,
    last_info: Mutex<Option<NetworkInfo>>,
    changes: broadcast::Sender<NetworkInfo>,
}

impl DesktopNetworkMonitor {
    /// Create a new network monitor probing the default address
    pub fn new() -> Self {
        Self::with_probe(DEFAULT_PROBE_ADDR, Duration::from_secs(3))
    }

    /// Create a monitor probing a specific `host:port`
    pub fn with_probe(probe_addr: impl Into<String>, probe_timeout: Duration) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            probe_addr: probe_addr.into(),
            probe_timeout,
            last_info: Mutex::new(None),
            changes,
        }
    }

    /// Record a host-observed connectivity change.
    ///
    /// Subscribers are only notified when the status actually changes.
    pub fn report(&self, info: NetworkInfo) {
        let changed = {
            let mut last = self.last_info.lock();
            let changed = last.as_ref().map(|l| l.status) != Some(info.status);
            *last = Some(info.clone());
            changed
        };

        if changed {
            info!(status = ?info.status, "Network status changed");
            // No receivers is fine; nobody is listening yet.
            let _ = self.changes.send(info);
        }
    }

    /// Convenience wrapper around [`report`](Self::report)
    pub fn set_online(&self, online: bool) {
        let info = if online {
            NetworkInfo::connected(Some(NetworkType::Other))
        } else {
            NetworkInfo::disconnected()
        };
        self.report(info);
    }

    async fn probe(&self) -> NetworkStatus {
        match tokio::time::timeout(
            self.probe_timeout,
            tokio::net::TcpStream::connect(&self.probe_addr),
        )
        .await
        {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) | Err(_) => NetworkStatus::Disconnected,
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        if let Some(info) = self.last_info.lock().clone() {
            return Ok(info);
        }

        let status = self.probe().await;
        debug!(status = ?status, probe = %self.probe_addr, "Initial connectivity probe");

        let info = match status {
            NetworkStatus::Connected => NetworkInfo::connected(Some(NetworkType::Other)),
            _ => NetworkInfo::disconnected(),
        };
        self.last_info.lock().get_or_insert(info.clone());
        Ok(info)
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        Ok(Box::new(BroadcastChangeStream {
            receiver: self.changes.subscribe(),
        }))
    }
}

/// Change stream fed by [`DesktopNetworkMonitor::report`]
struct BroadcastChangeStream {
    receiver: broadcast::Receiver<NetworkInfo>,
}

#[async_trait]
impl NetworkChangeStream for BroadcastChangeStream {
    async fn next(&mut self) -> Option<NetworkInfo> {
        loop {
            match self.receiver.recv().await {
                Ok(info) => return Some(info),
                // Only the latest state matters; skip what we missed.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Network change stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
