//! # Playback Resolver
//!
//! Turns locally stored blobs into short-lived handles a player can open.
//!
//! A handle is an [`ObjectUrl`] of the form `blob:offline/<uuid>`, backed by
//! an in-process [`ObjectUrlRegistry`]. Handles never survive a restart and
//! revoking one drops its bytes.

use crate::store::LocalStore;
use bridge_traits::SongId;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

const OBJECT_URL_PREFIX: &str = "blob:offline/";

/// Process-local handle to an in-memory blob
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    fn generate() -> Self {
        Self(format!("{}{}", OBJECT_URL_PREFIX, Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Audio,
    Image,
}

/// What a player reads when it opens a handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedObject {
    pub song_id: SongId,
    pub kind: AssetKind,
    pub content_type: String,
    pub data: Bytes,
}

struct RegisteredObject {
    object: ResolvedObject,
    created_at: Instant,
}

/// Table of live object URLs
#[derive(Default)]
pub struct ObjectUrlRegistry {
    entries: Mutex<HashMap<ObjectUrl, RegisteredObject>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        song_id: SongId,
        kind: AssetKind,
        content_type: impl Into<String>,
        data: Bytes,
    ) -> ObjectUrl {
        let url = ObjectUrl::generate();
        self.entries.lock().insert(
            url.clone(),
            RegisteredObject {
                object: ResolvedObject {
                    song_id,
                    kind,
                    content_type: content_type.into(),
                    data,
                },
                created_at: Instant::now(),
            },
        );
        url
    }

    pub fn open(&self, url: &ObjectUrl) -> Option<ResolvedObject> {
        self.entries.lock().get(url).map(|entry| entry.object.clone())
    }

    /// Returns `true` if the handle was live.
    pub fn revoke(&self, url: &ObjectUrl) -> bool {
        self.entries.lock().remove(url).is_some()
    }

    /// Revoke every handle older than `ttl`; returns how many were removed.
    pub fn revoke_older_than(&self, ttl: Duration) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.created_at.elapsed() < ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

pub struct PlaybackResolver {
    store: Arc<LocalStore>,
    registry: Arc<ObjectUrlRegistry>,
    ttl: Duration,
}

impl PlaybackResolver {
    pub fn new(store: Arc<LocalStore>, ttl: Duration) -> Self {
        Self {
            store,
            registry: Arc::new(ObjectUrlRegistry::new()),
            ttl,
        }
    }

    pub fn registry(&self) -> &Arc<ObjectUrlRegistry> {
        &self.registry
    }

    /// Handle for a stored song's audio, or `None` if it is not stored.
    ///
    /// The handle stays valid until [`release`](Self::release) or
    /// [`sweep_expired`](Self::sweep_expired).
    pub async fn get_offline_audio_url(&self, song_id: &SongId) -> Option<ObjectUrl> {
        self.resolve(song_id, AssetKind::Audio).await
    }

    pub async fn get_offline_image_url(&self, song_id: &SongId) -> Option<ObjectUrl> {
        self.resolve(song_id, AssetKind::Image).await
    }

    /// Audio handle that is revoked automatically after the configured TTL.
    pub async fn play_offline_song(&self, song_id: &SongId) -> Option<ObjectUrl> {
        let url = self.get_offline_audio_url(song_id).await?;
        self.schedule_release(url.clone());
        Some(url)
    }

    pub fn open(&self, url: &ObjectUrl) -> Option<ResolvedObject> {
        self.registry.open(url)
    }

    pub fn release(&self, url: &ObjectUrl) -> bool {
        self.registry.revoke(url)
    }

    pub fn sweep_expired(&self) -> usize {
        let removed = self.registry.revoke_older_than(self.ttl);
        if removed > 0 {
            debug!(removed, "Swept expired object URLs");
        }
        removed
    }

    fn schedule_release(&self, url: ObjectUrl) {
        let registry = Arc::clone(&self.registry);
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if registry.revoke(&url) {
                debug!(url = %url, "Released playback handle");
            }
        });
    }

    async fn resolve(&self, song_id: &SongId, kind: AssetKind) -> Option<ObjectUrl> {
        let blob = match kind {
            AssetKind::Audio => self.store.get_audio_blob(song_id).await,
            AssetKind::Image => self.store.get_image_blob(song_id).await,
        };

        let data = match blob {
            Ok(Some(data)) => data,
            Ok(None) => return None,
            Err(e) => {
                warn!(song_id = %song_id, ?kind, error = %e, "Failed to read offline blob");
                return None;
            }
        };

        let source_url = match self.store.get_song(song_id).await {
            Ok(Some(song)) => match kind {
                AssetKind::Audio => Some(song.archivo_url),
                AssetKind::Image => song.imagen_url,
            },
            _ => None,
        };
        let content_type = guess_content_type(source_url.as_deref(), kind);

        Some(self.registry.register(song_id.clone(), kind, content_type, data))
    }
}

/// MIME type from the remote file extension
fn guess_content_type(url: Option<&str>, kind: AssetKind) -> &'static str {
    let extension = url
        .map(|url| url.split(['?', '#']).next().unwrap_or(url))
        .and_then(|path| path.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match (kind, extension.as_deref()) {
        (AssetKind::Audio, Some("mp3")) => "audio/mpeg",
        (AssetKind::Audio, Some("m4a" | "mp4")) => "audio/mp4",
        (AssetKind::Audio, Some("aac")) => "audio/aac",
        (AssetKind::Audio, Some("ogg" | "oga")) => "audio/ogg",
        (AssetKind::Audio, Some("opus")) => "audio/opus",
        (AssetKind::Audio, Some("wav")) => "audio/wav",
        (AssetKind::Audio, Some("flac")) => "audio/flac",
        (AssetKind::Audio, Some("webm")) => "audio/webm",
        (AssetKind::Image, Some("jpg" | "jpeg")) => "image/jpeg",
        (AssetKind::Image, Some("png")) => "image/png",
        (AssetKind::Image, Some("webp")) => "image/webp",
        (AssetKind::Image, Some("gif")) => "image/gif",
        _ => "application/octet-stream",
    }
}
