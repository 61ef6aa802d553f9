//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, connectivity,
//! session) into the offline music cache. Desktop apps typically enable the
//! `desktop-shims` feature, which lets [`CoreConfig`] fall back to the
//! `bridge-desktop` adapters; mobile hosts inject their own.
//!
//! ```rust,ignore
//! let config = CoreConfig::builder()
//!     .database_path(data_dir.join("offline.db"))
//!     .catalog(CatalogApiConfig::new(base_url, anon_key))
//!     .build()?;
//! let service = OfflineMusicService::bootstrap(config, session).await?;
//!
//! if service.download_song(&SongId::from("42")).await {
//!     let url = service.play_offline_song(&SongId::from("42")).await;
//! }
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{Clock, HttpClient, NetworkMonitor, RemoteCatalog, SongId, SystemClock};
use core_auth::{AuthError, SessionProvider, SessionUser};
use core_offline::{
    ConnectivityMonitor, DownloadOrchestrator, DownloadedSong, LocalStore, ObjectUrl,
    OfflineCacheConfig, OfflineStatus, PlaybackResolver, ResolvedObject, StorageUsage,
    StoreConfig, SyncCoordinator, SyncOutcome,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, OfflineEvent};
use parking_lot::Mutex;
use provider_catalog::RestCatalogConnector;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{DesktopNetworkMonitor, ReqwestHttpClient};

const EVENT_BUS_CAPACITY: usize = 256;

/// Aggregated handle to all bridge dependencies the core requires.
#[derive(Clone)]
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub catalog: Arc<dyn RemoteCatalog>,
    pub session: Arc<dyn SessionProvider>,
    /// `None` starts the cache online; the host then reports transitions
    /// through [`OfflineMusicService::set_online`].
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,
    pub clock: Arc<dyn Clock>,
    pub event_bus: Arc<EventBus>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        catalog: Arc<dyn RemoteCatalog>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            http_client,
            catalog,
            session,
            network_monitor: None,
            clock: Arc::new(SystemClock),
            event_bus: Arc::new(EventBus::new(EVENT_BUS_CAPACITY)),
        }
    }

    pub fn with_network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }
}

/// Primary façade exposed to host applications.
///
/// All song operations act on behalf of the currently signed-in user. Songs
/// downloaded by anyone else are invisible: they are not listed, resolved for
/// playback, deleted or reported as downloaded.
pub struct OfflineMusicService {
    session: Arc<dyn SessionProvider>,
    store: Arc<LocalStore>,
    connectivity: Arc<ConnectivityMonitor>,
    orchestrator: DownloadOrchestrator,
    resolver: PlaybackResolver,
    sync: Arc<SyncCoordinator>,
    event_bus: Arc<EventBus>,
    auto_sync: Mutex<Option<JoinHandle<()>>>,
    session_follower: JoinHandle<()>,
}

impl OfflineMusicService {
    /// Build every component from a validated [`CoreConfig`].
    pub async fn bootstrap(config: CoreConfig, session: Arc<dyn SessionProvider>) -> Result<Self> {
        let catalog = Arc::new(RestCatalogConnector::new(
            config.http_client.clone(),
            config.catalog.clone(),
        ));

        let mut deps = CoreDependencies::new(config.http_client.clone(), catalog, session);
        if config.features.enable_network_awareness {
            if let Some(monitor) = &config.network_monitor {
                deps = deps.with_network_monitor(monitor.clone());
            }
        }

        let offline_config = OfflineCacheConfig::default()
            .with_database_url(config.database_url())
            .with_object_url_ttl(config.object_url_ttl);

        let service = Self::new(deps, offline_config).await?;
        service.initialize().await?;
        if config.features.auto_sync_on_reconnect {
            service.start_auto_sync();
        }

        info!(database = %config.database_path.display(), "Offline music service ready");
        Ok(service)
    }

    /// Build from explicit dependencies. Nothing touches the database until
    /// the first operation or [`initialize`](Self::initialize).
    pub async fn new(deps: CoreDependencies, config: OfflineCacheConfig) -> Result<Self> {
        config.validate().map_err(CoreError::Config)?;

        let connectivity = match &deps.network_monitor {
            Some(monitor) => {
                ConnectivityMonitor::from_network_monitor(
                    monitor.clone(),
                    Some(deps.event_bus.clone()),
                )
                .await
            }
            None => Arc::new(ConnectivityMonitor::new(true).with_event_bus(deps.event_bus.clone())),
        };

        let store = Arc::new(LocalStore::new(StoreConfig::from_url(&config.database_url)));

        let orchestrator = DownloadOrchestrator::new(
            store.clone(),
            deps.catalog.clone(),
            deps.http_client.clone(),
            connectivity.clone(),
            deps.session.clone(),
        )
        .with_clock(deps.clock.clone())
        .with_config(config.clone())
        .with_event_bus(deps.event_bus.clone());

        let resolver = PlaybackResolver::new(store.clone(), config.object_url_ttl);

        let sync = Arc::new(
            SyncCoordinator::new(store.clone(), connectivity.clone(), deps.session.clone())
                .with_event_bus(deps.event_bus.clone()),
        );

        let session_follower = Arc::clone(&sync)
            .spawn_session_follower(EventStream::new(deps.event_bus.subscribe()));

        Ok(Self {
            session: deps.session,
            store,
            connectivity,
            orchestrator,
            resolver,
            sync,
            event_bus: deps.event_bus,
            auto_sync: Mutex::new(None),
            session_follower,
        })
    }

    /// Open the store and publish the signed-in user's downloads.
    pub async fn initialize(&self) -> Result<()> {
        self.store.initialize().await?;
        if let Some(user) = self.current_user().await {
            self.sync.refresh_view(&user.id).await?;
        }
        Ok(())
    }

    /// Refresh the downloaded-songs view on every reconnect. Idempotent.
    pub fn start_auto_sync(&self) {
        let mut slot = self.auto_sync.lock();
        if slot.is_none() {
            *slot = Some(Arc::clone(&self.sync).spawn_auto_sync());
            debug!("Auto-sync on reconnect enabled");
        }
    }

    /// Download `song_id` for the signed-in user. Returns `true` once stored.
    #[instrument(skip(self), fields(song_id = %song_id))]
    pub async fn download_song(&self, song_id: &SongId) -> bool {
        let Some(user) = self.current_user().await else {
            debug!("Download refused: no signed-in user");
            return false;
        };

        let stored = self.orchestrator.download_song(song_id, &user.id).await;
        if stored {
            self.sync.follow_session().await;
        }
        stored
    }

    /// Remove one of the signed-in user's downloads. Returns `false` when the
    /// user has no such download.
    #[instrument(skip(self), fields(song_id = %song_id))]
    pub async fn delete_song(&self, song_id: &SongId) -> Result<bool> {
        let user = self.require_user().await?;

        match self.store.get_song(song_id).await? {
            Some(song) if song.usuario_id == user.id => {}
            _ => return Ok(false),
        }

        self.store.delete(song_id).await?;
        let _ = self.event_bus.emit(CoreEvent::Offline(OfflineEvent::SongRemoved {
            song_id: song_id.to_string(),
        }));
        info!("Offline song removed");

        self.sync.follow_session().await;
        Ok(true)
    }

    /// Downloads of the signed-in user, newest first. Empty when signed out.
    pub async fn list_downloaded_songs(&self) -> Result<Vec<DownloadedSong>> {
        match self.current_user().await {
            Some(user) => Ok(self.store.list_by_user(&user.id).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Last published snapshot of the downloaded-songs view, restricted to
    /// the signed-in user.
    pub async fn downloaded_songs(&self) -> Vec<DownloadedSong> {
        let Some(user) = self.current_user().await else {
            return Vec::new();
        };
        self.sync
            .downloaded_songs()
            .into_iter()
            .filter(|song| song.usuario_id == user.id)
            .collect()
    }

    /// Republished on every download, delete and session change.
    pub fn watch_downloaded_songs(&self) -> watch::Receiver<Vec<DownloadedSong>> {
        self.sync.subscribe()
    }

    pub async fn get_offline_audio_url(&self, song_id: &SongId) -> Option<ObjectUrl> {
        if !self.owns_download(song_id).await {
            return None;
        }
        self.resolver.get_offline_audio_url(song_id).await
    }

    pub async fn get_offline_image_url(&self, song_id: &SongId) -> Option<ObjectUrl> {
        if !self.owns_download(song_id).await {
            return None;
        }
        self.resolver.get_offline_image_url(song_id).await
    }

    /// Audio handle released automatically after the object URL TTL.
    pub async fn play_offline_song(&self, song_id: &SongId) -> Option<ObjectUrl> {
        if !self.owns_download(song_id).await {
            return None;
        }
        self.resolver.play_offline_song(song_id).await
    }

    pub fn open_object_url(&self, url: &ObjectUrl) -> Option<ResolvedObject> {
        self.resolver.open(url)
    }

    pub fn release_object_url(&self, url: &ObjectUrl) -> bool {
        self.resolver.release(url)
    }

    pub fn sweep_object_urls(&self) -> usize {
        self.resolver.sweep_expired()
    }

    pub async fn sync_with_server(&self) -> Result<SyncOutcome> {
        Ok(self.sync.sync_with_server().await?)
    }

    pub async fn storage_usage(&self) -> Result<StorageUsage> {
        match self.current_user().await {
            Some(user) => Ok(self.store.usage_for_user(&user.id).await?),
            None => Ok(StorageUsage::default()),
        }
    }

    /// Delete every download of the signed-in user; returns how many.
    pub async fn clear_downloads(&self) -> Result<u64> {
        let user = self.require_user().await?;
        let removed = self.store.clear_user(&user.id).await?;
        self.sync.follow_session().await;
        Ok(removed)
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Host-reported connectivity change
    pub fn set_online(&self, online: bool) -> bool {
        self.connectivity.set_online(online)
    }

    pub async fn status(&self, song_id: &SongId) -> OfflineStatus {
        match self.current_user().await {
            Some(user) => self.orchestrator.status(song_id, &user.id).await,
            None => OfflineStatus::NotDownloaded,
        }
    }

    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// Stop background work and close the store.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.auto_sync.lock().take() {
            handle.abort();
        }
        self.session_follower.abort();
        self.store.close().await;
        info!("Offline music service stopped");
    }

    async fn current_user(&self) -> Option<SessionUser> {
        match self.session.current_user().await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Session lookup failed");
                None
            }
        }
    }

    async fn require_user(&self) -> Result<SessionUser> {
        self.current_user()
            .await
            .ok_or(CoreError::Auth(AuthError::NotAuthenticated))
    }

    /// Whether the signed-in user has `song_id` downloaded
    async fn owns_download(&self, song_id: &SongId) -> bool {
        let Some(user) = self.current_user().await else {
            debug!(song_id = %song_id, "Playback refused: no signed-in user");
            return false;
        };
        match self.store.get_song(song_id).await {
            Ok(Some(song)) => song.usuario_id == user.id,
            Ok(None) => false,
            Err(e) => {
                warn!(song_id = %song_id, error = %e, "Ownership lookup failed");
                false
            }
        }
    }
}

impl Drop for OfflineMusicService {
    fn drop(&mut self) {
        if let Some(handle) = self.auto_sync.lock().take() {
            handle.abort();
        }
        self.session_follower.abort();
    }
}
