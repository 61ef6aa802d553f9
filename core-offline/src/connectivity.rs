//! # Connectivity Monitor
//!
//! Holds the current online/offline flag and broadcasts transitions.
//!
//! The flag lives in a `tokio::sync::watch` channel. Readers either sample it
//! with [`ConnectivityMonitor::is_online`] or hold a receiver from
//! [`ConnectivityMonitor::subscribe`] and await changes. Only real
//! transitions notify; reporting the current state again is a no-op.

use bridge_traits::NetworkMonitor;
use core_runtime::events::{ConnectivityEvent, CoreEvent, EventBus};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
    event_bus: Option<Arc<EventBus>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        Self {
            state,
            event_bus: None,
            listener: Mutex::new(None),
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Monitor fed by a platform [`NetworkMonitor`].
    ///
    /// The initial state is sampled once, then a background task applies every
    /// change the platform reports. If the platform cannot deliver change
    /// notifications the monitor keeps the sampled state and can still be
    /// driven with [`set_online`](Self::set_online).
    pub async fn from_network_monitor(
        network: Arc<dyn NetworkMonitor>,
        event_bus: Option<Arc<EventBus>>,
    ) -> Arc<Self> {
        let online = network.is_connected().await;
        let mut monitor = Self::new(online);
        monitor.event_bus = event_bus;
        let monitor = Arc::new(monitor);

        info!(online, "Connectivity monitor started");

        match network.subscribe_changes().await {
            Ok(mut changes) => {
                let weak: Weak<Self> = Arc::downgrade(&monitor);
                let handle = tokio::spawn(async move {
                    while let Some(info) = changes.next().await {
                        let Some(monitor) = weak.upgrade() else {
                            break;
                        };
                        monitor.set_online(info.is_online());
                    }
                    debug!("Network change stream ended");
                });
                *monitor.listener.lock() = Some(handle);
            }
            Err(e) => {
                warn!(error = %e, "Network change notifications unavailable");
            }
        }

        monitor
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Apply a platform report. Returns `true` if the state changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            info!(online, "Connectivity changed");
            if let Some(bus) = &self.event_bus {
                let _ = bus.emit(CoreEvent::Connectivity(ConnectivityEvent::from_online(
                    online,
                )));
            }
        }
        changed
    }

    /// Receiver notified on every transition
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
        }
    }
}
