//! # Sync Coordinator
//!
//! Keeps the in-memory list of downloaded songs in step with the local store.
//! The list is published through a `watch` channel so UI layers can render
//! the latest snapshot and await updates.
//!
//! Syncing never talks to the server: it re-reads the store for the current
//! user. Remote deletions and metadata changes are not reconciled.
//!
//! The view only ever holds the signed-in user's downloads. It is emptied on
//! sign-out and republished on sign-in when the session publishes
//! [`AuthEvent`]s (see [`SyncCoordinator::spawn_session_follower`]).

use crate::connectivity::ConnectivityMonitor;
use crate::error::Result;
use crate::models::DownloadedSong;
use crate::store::LocalStore;
use bridge_traits::UserId;
use core_auth::SessionProvider;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus, EventStream, OfflineEvent};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Offline,
    NotAuthenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    Refreshed { song_count: usize },
}

pub struct SyncCoordinator {
    store: Arc<LocalStore>,
    connectivity: Arc<ConnectivityMonitor>,
    session: Arc<dyn SessionProvider>,
    view: watch::Sender<Vec<DownloadedSong>>,
    event_bus: Option<Arc<EventBus>>,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<LocalStore>,
        connectivity: Arc<ConnectivityMonitor>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        let (view, _) = watch::channel(Vec::new());
        Self {
            store,
            connectivity,
            session,
            view,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Republish the view for the signed-in user.
    ///
    /// Returns immediately with [`SyncOutcome::Skipped`] when offline or
    /// signed out. Store read failures are returned and leave the view as is.
    pub async fn sync_with_server(&self) -> Result<SyncOutcome> {
        if !self.connectivity.is_online() {
            debug!("Sync skipped: offline");
            return Ok(SyncOutcome::Skipped(SkipReason::Offline));
        }

        let user = match self.session.current_user().await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("Sync skipped: no signed-in user");
                self.clear_view();
                return Ok(SyncOutcome::Skipped(SkipReason::NotAuthenticated));
            }
            Err(e) => {
                warn!(error = %e, "Sync skipped: session unavailable");
                self.clear_view();
                return Ok(SyncOutcome::Skipped(SkipReason::NotAuthenticated));
            }
        };

        let song_count = self.refresh_view(&user.id).await?;
        info!(user_id = %user.id, song_count, "Offline library synced");
        Ok(SyncOutcome::Refreshed { song_count })
    }

    /// Re-read the store for `user_id` and publish it, regardless of connectivity.
    pub async fn refresh_view(&self, user_id: &UserId) -> Result<usize> {
        let songs = self.store.list_by_user(user_id).await?;
        let song_count = songs.len();

        self.view.send_replace(songs);
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Offline(OfflineEvent::LibraryRefreshed {
                user_id: user_id.to_string(),
                song_count,
            }));
        }
        Ok(song_count)
    }

    /// Empty the view, e.g. after sign-out.
    pub fn clear_view(&self) {
        self.view.send_replace(Vec::new());
    }

    /// Republish the view for whoever is signed in now, or empty it.
    ///
    /// Unlike [`sync_with_server`](Self::sync_with_server) this ignores
    /// connectivity. A store failure also empties the view rather than leave
    /// another user's songs in it.
    pub async fn follow_session(&self) {
        match self.session.current_user().await {
            Ok(Some(user)) => {
                if let Err(e) = self.refresh_view(&user.id).await {
                    warn!(user_id = %user.id, error = %e, "Failed to republish downloads");
                    self.clear_view();
                }
            }
            Ok(None) => self.clear_view(),
            Err(e) => {
                warn!(error = %e, "Session lookup failed, clearing downloads view");
                self.clear_view();
            }
        }
    }

    pub fn downloaded_songs(&self) -> Vec<DownloadedSong> {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<DownloadedSong>> {
        self.view.subscribe()
    }

    /// Sync on every offline to online transition until the task is aborted.
    pub fn spawn_auto_sync(self: Arc<Self>) -> JoinHandle<()> {
        let mut connectivity = self.connectivity.subscribe();
        tokio::spawn(async move {
            while connectivity.changed().await.is_ok() {
                let online = *connectivity.borrow_and_update();
                if !online {
                    continue;
                }
                match self.sync_with_server().await {
                    Ok(outcome) => debug!(?outcome, "Reconnect sync finished"),
                    Err(e) => warn!(error = %e, "Reconnect sync failed"),
                }
            }
        })
    }

    /// Follow sign-in and sign-out on `events` until the bus closes or the
    /// task is aborted. The session is re-read on each event, so a stale
    /// event never publishes a previous user's songs.
    pub fn spawn_session_follower(self: Arc<Self>, events: EventStream) -> JoinHandle<()> {
        let mut events = events.filter(|event| matches!(event, CoreEvent::Auth(_)));
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(CoreEvent::Auth(AuthEvent::SignedIn { user_id }))
                    | Ok(CoreEvent::Auth(AuthEvent::SignedOut { user_id })) => {
                        debug!(user_id = %user_id, "Session changed");
                        self.follow_session().await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Missed session events, resyncing view");
                        self.follow_session().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
