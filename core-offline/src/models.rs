//! Offline cache data model

use bridge_traits::{RemoteSong, SongId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A song stored for offline playback.
///
/// Display fields are copied from the catalog at download time and never
/// refreshed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedSong {
    pub id: SongId,
    pub titulo: String,
    pub artista: String,
    pub album: Option<String>,
    /// Duration in seconds
    pub duracion: u32,
    /// Remote audio location the bytes were fetched from
    pub archivo_url: String,
    pub imagen_url: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub downloaded_at: DateTime<Utc>,
    /// Audio plus image bytes
    pub file_size: u64,
    /// User who downloaded the song; every listing is scoped by it
    pub usuario_id: UserId,
}

impl DownloadedSong {
    /// Build the local record for `song` as downloaded by `owner`.
    pub fn from_remote(
        song: &RemoteSong,
        artista: impl Into<String>,
        owner: UserId,
        downloaded_at: DateTime<Utc>,
        file_size: u64,
    ) -> Self {
        Self {
            id: song.id.clone(),
            titulo: song.titulo.clone(),
            artista: artista.into(),
            album: song.album.clone(),
            duracion: song.duracion,
            archivo_url: song.archivo_audio.clone(),
            imagen_url: song.imagen_url.clone(),
            downloaded_at,
            file_size,
            usuario_id: owner,
        }
    }
}

/// Per-song download state as seen by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineStatus {
    NotDownloaded,
    Downloading,
    Downloaded,
}

/// Aggregate storage used by one user's downloads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUsage {
    pub song_count: u64,
    pub total_bytes: u64,
}

impl StorageUsage {
    pub fn total_megabytes(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn average_song_bytes(&self) -> u64 {
        self.total_bytes.checked_div(self.song_count).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn remote() -> RemoteSong {
        RemoteSong {
            id: SongId::from("s1"),
            titulo: "Track A".to_string(),
            archivo_audio: "https://cdn.example.com/a.mp3".to_string(),
            imagen_url: None,
            usuario_id: UserId::from("artist-9"),
            duracion: 215,
            album: Some("Demo".to_string()),
        }
    }

    #[test]
    fn test_from_remote_scopes_to_downloader() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let song = DownloadedSong::from_remote(&remote(), "Ana", UserId::from("u1"), at, 2048);

        assert_eq!(song.usuario_id, UserId::from("u1"));
        assert_eq!(song.archivo_url, "https://cdn.example.com/a.mp3");
        assert_eq!(song.artista, "Ana");
        assert_eq!(song.file_size, 2048);
    }

    #[test]
    fn test_downloaded_at_serializes_as_millis() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let song = DownloadedSong::from_remote(&remote(), "Ana", UserId::from("u1"), at, 1);

        let json = serde_json::to_value(&song).unwrap();
        assert_eq!(json["downloaded_at"], 1_700_000_000_123i64);
        assert_eq!(json["usuario_id"], "u1");
    }

    #[test]
    fn test_storage_usage_helpers() {
        let usage = StorageUsage {
            song_count: 4,
            total_bytes: 4 * 1024 * 1024,
        };
        assert_eq!(usage.average_song_bytes(), 1024 * 1024);
        assert!((usage.total_megabytes() - 4.0).abs() < f64::EPSILON);
        assert_eq!(StorageUsage::default().average_song_bytes(), 0);
    }
}
