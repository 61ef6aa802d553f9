//! Shared fakes for offline cache integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, HttpClient, HttpRequest, HttpResponse, ManualClock, RemoteCatalog, RemoteSong,
    RemoteUser, RetryPolicy, SongId, UserId,
};
use bytes::Bytes;
use core_auth::{InMemorySessionProvider, SessionUser};
use core_offline::{
    ConnectivityMonitor, DownloadOrchestrator, LocalStore, OfflineCacheConfig, StoreConfig,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const START_MILLIS: i64 = 1_700_000_000_000;

pub fn audio_url(id: &str) -> String {
    format!("https://cdn.example.com/audio/{}.mp3", id)
}

pub fn image_url(id: &str) -> String {
    format!("https://cdn.example.com/covers/{}.jpg", id)
}

#[derive(Default)]
pub struct FakeCatalog {
    songs: Mutex<HashMap<SongId, RemoteSong>>,
    users: Mutex<HashMap<UserId, RemoteUser>>,
    fail_user_lookups: AtomicBool,
    calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn add_song(&self, id: &str, uploader: &str, with_image: bool) {
        let song = RemoteSong {
            id: SongId::from(id),
            titulo: format!("Song {}", id),
            archivo_audio: audio_url(id),
            imagen_url: with_image.then(|| image_url(id)),
            usuario_id: UserId::from(uploader),
            duracion: 180,
            album: Some("Singles".to_string()),
        };
        self.songs.lock().insert(song.id.clone(), song);
    }

    pub fn add_user(&self, id: &str, name: Option<&str>) {
        self.users.lock().insert(
            UserId::from(id),
            RemoteUser {
                nombre_usuario: name.map(str::to_string),
            },
        );
    }

    pub fn fail_user_lookups(&self) {
        self.fail_user_lookups.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteCatalog for FakeCatalog {
    async fn get_song(&self, id: &SongId) -> BridgeResult<Option<RemoteSong>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.songs.lock().get(id).cloned())
    }

    async fn get_user(&self, id: &UserId) -> BridgeResult<Option<RemoteUser>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_user_lookups.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("HTTP 500".to_string()));
        }
        Ok(self.users.lock().get(id).cloned())
    }
}

/// HTTP fake serving canned bodies by URL. Unknown URLs return 404.
///
/// A gated fake holds every request until [`FakeHttp::release`] is called.
#[derive(Default)]
pub struct FakeHttp {
    responses: Mutex<HashMap<String, (u16, Bytes)>>,
    gate: Option<Semaphore>,
    calls: AtomicUsize,
}

impl FakeHttp {
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn serve(&self, url: impl Into<String>, status: u16, body: &[u8]) {
        self.responses
            .lock()
            .insert(url.into(), (status, Bytes::copy_from_slice(body)));
    }

    pub fn release(&self, requests: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(requests);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| BridgeError::OperationFailed(e.to_string()))?
                .forget();
        }
        let response = self.responses.lock().get(&request.url).cloned();
        Ok(match response {
            Some((status, body)) => HttpResponse::new(status, body),
            None => HttpResponse::new(404, Bytes::new()),
        })
    }
}

pub struct TestContext {
    pub store: Arc<LocalStore>,
    pub catalog: Arc<FakeCatalog>,
    pub http: Arc<FakeHttp>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub session: Arc<InMemorySessionProvider>,
    pub clock: Arc<ManualClock>,
    pub orchestrator: Arc<DownloadOrchestrator>,
}

impl TestContext {
    /// Online, signed in as `u1`, empty in-memory store.
    pub fn new() -> Self {
        Self::with_http(FakeHttp::default())
    }

    pub fn with_http(http: FakeHttp) -> Self {
        let store = Arc::new(LocalStore::new(StoreConfig::in_memory()));
        let catalog = Arc::new(FakeCatalog::default());
        let http = Arc::new(http);
        let connectivity = Arc::new(ConnectivityMonitor::new(true));
        let session = Arc::new(InMemorySessionProvider::signed_in(SessionUser::new("u1")));
        let clock = Arc::new(ManualClock::from_millis(START_MILLIS));

        let orchestrator = Arc::new(
            DownloadOrchestrator::new(
                store.clone(),
                catalog.clone(),
                http.clone(),
                connectivity.clone(),
                session.clone(),
            )
            .with_clock(clock.clone())
            .with_config(OfflineCacheConfig::in_memory().with_retry_policy(RetryPolicy::none())),
        );

        Self {
            store,
            catalog,
            http,
            connectivity,
            session,
            clock,
            orchestrator,
        }
    }

    /// Publish a song in the catalog and serve its audio (and image when given).
    pub fn seed_song(&self, id: &str, uploader: &str, audio: &[u8], image: Option<&[u8]>) {
        self.catalog.add_song(id, uploader, image.is_some());
        self.http.serve(audio_url(id), 200, audio);
        if let Some(image) = image {
            self.http.serve(image_url(id), 200, image);
        }
    }

    pub async fn download(&self, song: &str, user: &str) -> bool {
        self.orchestrator
            .download_song(&SongId::from(song), &UserId::from(user))
            .await
    }
}
