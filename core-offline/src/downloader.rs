//! # Download Orchestrator
//!
//! Fetches a song's metadata, artist name, audio and cover art, then commits
//! them to the [`LocalStore`] in one transaction.
//!
//! ## Flow
//!
//! 1. Refuse when offline or when `user_id` is not the signed-in user. No
//!    network or store access happens in that case.
//! 2. Mark the song as downloading.
//! 3. Fetch the catalog record (mandatory).
//! 4. Resolve the artist display name (optional, falls back to a sentinel).
//! 5. Fetch audio bytes (mandatory) and cover art (optional).
//! 6. Commit everything with [`LocalStore::put`].
//!
//! The downloading mark is advisory and kept per user. Two concurrent requests
//! for the same song both run to completion and the last commit wins.

use crate::config::OfflineCacheConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{OfflineError, Result};
use crate::models::{DownloadedSong, OfflineStatus};
use crate::store::LocalStore;
use bridge_traits::{
    Clock, HttpClient, HttpRequest, RemoteCatalog, RemoteUser, SongId, SystemClock, UserId,
};
use bytes::Bytes;
use core_auth::SessionProvider;
use core_runtime::events::{CoreEvent, EventBus, OfflineEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

type InFlightKey = (SongId, UserId);

pub struct DownloadOrchestrator {
    store: Arc<LocalStore>,
    catalog: Arc<dyn RemoteCatalog>,
    http_client: Arc<dyn HttpClient>,
    connectivity: Arc<ConnectivityMonitor>,
    session: Arc<dyn SessionProvider>,
    clock: Arc<dyn Clock>,
    config: OfflineCacheConfig,
    event_bus: Option<Arc<EventBus>>,
    /// (song, downloading user) -> number of downloads currently running
    in_flight: Mutex<HashMap<InFlightKey, usize>>,
}

impl DownloadOrchestrator {
    pub fn new(
        store: Arc<LocalStore>,
        catalog: Arc<dyn RemoteCatalog>,
        http_client: Arc<dyn HttpClient>,
        connectivity: Arc<ConnectivityMonitor>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            store,
            catalog,
            http_client,
            connectivity,
            session,
            clock: Arc::new(SystemClock),
            config: OfflineCacheConfig::default(),
            event_bus: None,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: OfflineCacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Download a song for offline playback.
    ///
    /// Returns `true` only if the song was committed to the local store. The
    /// reason for a failure is logged; use [`download`](Self::download) to
    /// receive it.
    pub async fn download_song(&self, song_id: &SongId, user_id: &UserId) -> bool {
        match self.download(song_id, user_id).await {
            Ok(_) => true,
            Err(e) if e.is_precondition() => {
                debug!(song_id = %song_id, reason = %e, "Download refused");
                false
            }
            Err(e) if e.is_transient() => {
                warn!(song_id = %song_id, error = %e, "Download failed, may succeed later");
                false
            }
            Err(e) => {
                error!(song_id = %song_id, error = %e, "Download failed");
                false
            }
        }
    }

    /// Same flow as [`download_song`](Self::download_song) with the typed error.
    #[instrument(skip_all, fields(song_id = %song_id, user_id = %user_id))]
    pub async fn download(&self, song_id: &SongId, user_id: &UserId) -> Result<DownloadedSong> {
        if !self.connectivity.is_online() {
            return Err(OfflineError::Offline);
        }
        let user = self.session.require_user_id(user_id).await?;

        let _guard = self.mark_downloading(song_id, &user.id);
        self.emit(OfflineEvent::DownloadStarted {
            song_id: song_id.to_string(),
        });
        info!("Starting offline download");

        let result = self.fetch_and_store(song_id, &user.id).await;
        match &result {
            Ok(song) => {
                info!(file_size = song.file_size, "Song available offline");
                self.emit(OfflineEvent::DownloadCompleted {
                    song_id: song_id.to_string(),
                    file_size: song.file_size,
                });
            }
            Err(e) => {
                self.emit(OfflineEvent::DownloadFailed {
                    song_id: song_id.to_string(),
                    reason: e.to_string(),
                });
            }
        }
        result
    }

    async fn fetch_and_store(&self, song_id: &SongId, owner: &UserId) -> Result<DownloadedSong> {
        let remote = self
            .catalog
            .get_song(song_id)
            .await?
            .ok_or_else(|| OfflineError::NotFound(song_id.to_string()))?;

        let artista = self.resolve_artist(&remote.usuario_id).await;

        let audio = self.fetch_binary(&remote.archivo_audio).await?;

        let image = match remote.imagen_url.as_deref().filter(|url| !url.trim().is_empty()) {
            Some(url) => match self.fetch_binary(url).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    let e = OfflineError::OptionalAsset(e.to_string());
                    warn!(error = %e, "Storing song without cover art");
                    None
                }
            },
            None => None,
        };

        let file_size = (audio.len() + image.as_ref().map_or(0, Bytes::len)) as u64;
        let mut song = DownloadedSong::from_remote(
            &remote,
            artista,
            owner.clone(),
            self.clock.now(),
            file_size,
        );
        song.id = song_id.clone();

        self.store.put(&song, &audio, image.as_deref()).await?;
        Ok(song)
    }

    /// Display name of the uploader, or the unknown-artist sentinel.
    async fn resolve_artist(&self, uploader: &UserId) -> String {
        match self.catalog.get_user(uploader).await {
            Ok(Some(RemoteUser {
                nombre_usuario: Some(name),
            })) if !name.trim().is_empty() => name,
            Ok(_) => {
                debug!(uploader = %uploader, "Uploader has no display name");
                self.config.unknown_artist.clone()
            }
            Err(e) => {
                let e = OfflineError::OptionalAsset(e.to_string());
                warn!(uploader = %uploader, error = %e, "Artist lookup failed");
                self.config.unknown_artist.clone()
            }
        }
    }

    async fn fetch_binary(&self, url: &str) -> Result<Bytes> {
        let request = HttpRequest::get(url).timeout(self.config.download_timeout);
        let body = self
            .http_client
            .get_bytes(request, self.config.retry_policy.clone())
            .await?;

        if body.is_empty() {
            return Err(OfflineError::RemoteFetch(format!(
                "GET {} returned an empty body",
                url
            )));
        }

        debug!(bytes = body.len(), "Fetched binary");
        Ok(body)
    }

    /// Offline state of `song_id` for `user_id`. Read failures count as not downloaded.
    ///
    /// Downloads started by other users are not reported.
    pub async fn status(&self, song_id: &SongId, user_id: &UserId) -> OfflineStatus {
        if self.is_downloading_for(song_id, user_id) {
            return OfflineStatus::Downloading;
        }
        match self.store.get_song(song_id).await {
            Ok(Some(song)) if &song.usuario_id == user_id => OfflineStatus::Downloaded,
            Ok(_) => OfflineStatus::NotDownloaded,
            Err(e) => {
                warn!(song_id = %song_id, error = %e, "Status lookup failed");
                OfflineStatus::NotDownloaded
            }
        }
    }

    /// Whether any user is downloading `song_id`
    pub fn is_downloading(&self, song_id: &SongId) -> bool {
        self.in_flight.lock().keys().any(|(id, _)| id == song_id)
    }

    pub fn is_downloading_for(&self, song_id: &SongId, user_id: &UserId) -> bool {
        self.in_flight
            .lock()
            .contains_key(&(song_id.clone(), user_id.clone()))
    }

    /// Ids currently being downloaded by anyone, sorted and deduplicated
    pub fn downloading_ids(&self) -> Vec<SongId> {
        let mut ids: Vec<SongId> = self
            .in_flight
            .lock()
            .keys()
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    fn mark_downloading(&self, song_id: &SongId, user_id: &UserId) -> InFlightGuard<'_> {
        let key = (song_id.clone(), user_id.clone());
        *self.in_flight.lock().entry(key.clone()).or_insert(0) += 1;
        InFlightGuard {
            in_flight: &self.in_flight,
            key,
        }
    }

    fn emit(&self, event: OfflineEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Offline(event));
        }
    }
}

/// Clears the downloading mark on every exit path
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashMap<InFlightKey, usize>>,
    key: InFlightKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock();
        if let Some(count) = in_flight.get_mut(&self.key) {
            *count -= 1;
            if *count == 0 {
                in_flight.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UNKNOWN_ARTIST;
    use crate::store::StoreConfig;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{BridgeError, HttpResponse, ManualClock, RemoteSong, RetryPolicy};
    use core_auth::{InMemorySessionProvider, SessionUser};
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        Catalog {}

        #[async_trait]
        impl RemoteCatalog for Catalog {
            async fn get_song(&self, id: &SongId) -> BridgeResult<Option<RemoteSong>>;
            async fn get_user(&self, id: &UserId) -> BridgeResult<Option<RemoteUser>>;
        }
    }

    mock! {
        Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    const AUDIO_URL: &str = "https://cdn.example.com/s1.mp3";
    const IMAGE_URL: &str = "https://cdn.example.com/s1.jpg";

    fn remote_song(image: bool) -> RemoteSong {
        RemoteSong {
            id: SongId::from("s1"),
            titulo: "Bailando".to_string(),
            archivo_audio: AUDIO_URL.to_string(),
            imagen_url: image.then(|| IMAGE_URL.to_string()),
            usuario_id: UserId::from("artist-1"),
            duracion: 200,
            album: None,
        }
    }

    struct Harness {
        store: Arc<LocalStore>,
        connectivity: Arc<ConnectivityMonitor>,
        session: Arc<InMemorySessionProvider>,
        bus: Arc<EventBus>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(LocalStore::new(StoreConfig::in_memory())),
                connectivity: Arc::new(ConnectivityMonitor::new(true)),
                session: Arc::new(InMemorySessionProvider::signed_in(SessionUser::new("u1"))),
                bus: Arc::new(EventBus::new(16)),
            }
        }

        fn orchestrator(&self, catalog: MockCatalog, http: MockHttp) -> DownloadOrchestrator {
            DownloadOrchestrator::new(
                self.store.clone(),
                Arc::new(catalog),
                Arc::new(http),
                self.connectivity.clone(),
                self.session.clone(),
            )
            .with_clock(Arc::new(ManualClock::from_millis(1_700_000_000_000)))
            .with_config(OfflineCacheConfig::in_memory().with_retry_policy(RetryPolicy::none()))
            .with_event_bus(self.bus.clone())
        }
    }

    fn catalog_with(song: RemoteSong, artist: Option<&'static str>) -> MockCatalog {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_get_song()
            .returning(move |_| Ok(Some(song.clone())));
        catalog.expect_get_user().returning(move |_| {
            Ok(Some(RemoteUser {
                nombre_usuario: artist.map(str::to_string),
            }))
        });
        catalog
    }

    fn http_serving(audio: &'static [u8], image: Option<&'static [u8]>) -> MockHttp {
        let mut http = MockHttp::new();
        http.expect_execute().returning(move |request| {
            let response = match request.url.as_str() {
                AUDIO_URL => HttpResponse::new(200, audio),
                IMAGE_URL => match image {
                    Some(bytes) => HttpResponse::new(200, bytes),
                    None => HttpResponse::new(404, &b""[..]),
                },
                _ => HttpResponse::new(404, &b""[..]),
            };
            Ok(response)
        });
        http
    }

    #[tokio::test]
    async fn test_download_commits_full_record() {
        let harness = Harness::new();
        let orchestrator = harness.orchestrator(
            catalog_with(remote_song(true), Some("Ana")),
            http_serving(b"audio", Some(&b"img"[..])),
        );

        assert!(orchestrator.download_song(&SongId::from("s1"), &UserId::from("u1")).await);

        let stored = harness.store.get_song(&SongId::from("s1")).await.unwrap().unwrap();
        assert_eq!(stored.artista, "Ana");
        assert_eq!(stored.usuario_id, UserId::from("u1"));
        assert_eq!(stored.file_size, 8);
        assert_eq!(stored.downloaded_at.timestamp_millis(), 1_700_000_000_000);
        assert!(harness.store.get_image_blob(&SongId::from("s1")).await.unwrap().is_some());
        assert!(!orchestrator.is_downloading(&SongId::from("s1")));
    }

    #[tokio::test]
    async fn test_offline_refuses_without_io() {
        let harness = Harness::new();
        harness.connectivity.set_online(false);
        // No expectations: any catalog or HTTP call panics.
        let orchestrator = harness.orchestrator(MockCatalog::new(), MockHttp::new());

        let result = orchestrator.download(&SongId::from("s1"), &UserId::from("u1")).await;
        assert!(matches!(result, Err(OfflineError::Offline)));
        assert!(harness.store.list_by_user(&UserId::from("u1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_signed_out_or_other_user_refused() {
        let harness = Harness::new();
        let orchestrator = harness.orchestrator(MockCatalog::new(), MockHttp::new());

        assert!(!orchestrator.download_song(&SongId::from("s1"), &UserId::from("u2")).await);

        harness.session.sign_out();
        let result = orchestrator.download(&SongId::from("s1"), &UserId::from("u1")).await;
        assert!(matches!(result, Err(OfflineError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_artist_lookup_failure_uses_sentinel() {
        let harness = Harness::new();
        let mut catalog = MockCatalog::new();
        catalog
            .expect_get_song()
            .with(eq(SongId::from("s1")))
            .returning(|_| Ok(Some(remote_song(false))));
        catalog
            .expect_get_user()
            .with(eq(UserId::from("artist-1")))
            .returning(|_| Err(BridgeError::OperationFailed("HTTP 500".into())));
        let orchestrator = harness.orchestrator(catalog, http_serving(b"audio", None));

        assert!(orchestrator.download_song(&SongId::from("s1"), &UserId::from("u1")).await);
        let stored = harness.store.get_song(&SongId::from("s1")).await.unwrap().unwrap();
        assert_eq!(stored.artista, UNKNOWN_ARTIST);
    }

    #[tokio::test]
    async fn test_image_failure_is_tolerated() {
        let harness = Harness::new();
        let orchestrator = harness.orchestrator(
            catalog_with(remote_song(true), None),
            http_serving(b"audio", None),
        );

        assert!(orchestrator.download_song(&SongId::from("s1"), &UserId::from("u1")).await);
        let stored = harness.store.get_song(&SongId::from("s1")).await.unwrap().unwrap();
        assert_eq!(stored.file_size, 5);
        assert_eq!(stored.artista, UNKNOWN_ARTIST);
        assert!(harness.store.get_image_blob(&SongId::from("s1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_audio_failure_commits_nothing() {
        let harness = Harness::new();
        let mut events = harness.bus.subscribe();
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(503, &b""[..])));
        let orchestrator = harness.orchestrator(catalog_with(remote_song(true), Some("Ana")), http);

        let result = orchestrator.download(&SongId::from("s1"), &UserId::from("u1")).await;
        assert!(matches!(result, Err(OfflineError::RemoteFetch(_))));
        assert!(harness.store.get_song(&SongId::from("s1")).await.unwrap().is_none());

        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Offline(OfflineEvent::DownloadStarted { .. })
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Offline(OfflineEvent::DownloadFailed { .. })
        ));
        assert!(orchestrator.downloading_ids().is_empty());
    }

    #[tokio::test]
    async fn test_empty_audio_body_is_a_failure() {
        let harness = Harness::new();
        let orchestrator = harness.orchestrator(
            catalog_with(remote_song(false), Some("Ana")),
            http_serving(b"", None),
        );

        assert!(!orchestrator.download_song(&SongId::from("s1"), &UserId::from("u1")).await);
        assert!(harness.store.get_audio_blob(&SongId::from("s1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_catalog_record_fails() {
        let harness = Harness::new();
        let mut catalog = MockCatalog::new();
        catalog.expect_get_song().returning(|_| Ok(None));
        let orchestrator = harness.orchestrator(catalog, MockHttp::new());

        let result = orchestrator.download(&SongId::from("s9"), &UserId::from("u1")).await;
        assert!(matches!(result, Err(OfflineError::NotFound(id)) if id == "s9"));
        assert!(!orchestrator.is_downloading(&SongId::from("s9")));
    }

    #[tokio::test]
    async fn test_status_is_scoped_to_owner() {
        let harness = Harness::new();
        let orchestrator = harness.orchestrator(
            catalog_with(remote_song(false), Some("Ana")),
            http_serving(b"audio", None),
        );
        let song = SongId::from("s1");
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));

        assert_eq!(orchestrator.status(&song, &u1).await, OfflineStatus::NotDownloaded);
        orchestrator.download_song(&song, &u1).await;
        assert_eq!(orchestrator.status(&song, &u1).await, OfflineStatus::Downloaded);
        assert_eq!(orchestrator.status(&song, &u2).await, OfflineStatus::NotDownloaded);
    }

    #[tokio::test]
    async fn test_in_flight_mark_is_per_user() {
        let harness = Harness::new();
        let orchestrator = harness.orchestrator(MockCatalog::new(), MockHttp::new());
        let song = SongId::from("s1");
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));

        let first = orchestrator.mark_downloading(&song, &u1);
        let second = orchestrator.mark_downloading(&song, &u1);
        assert_eq!(orchestrator.status(&song, &u1).await, OfflineStatus::Downloading);
        assert_eq!(orchestrator.status(&song, &u2).await, OfflineStatus::NotDownloaded);
        assert!(!orchestrator.is_downloading_for(&song, &u2));
        assert_eq!(orchestrator.downloading_ids(), vec![song.clone()]);

        drop(first);
        assert!(orchestrator.is_downloading_for(&song, &u1));
        drop(second);
        assert!(!orchestrator.is_downloading(&song));
    }
}
