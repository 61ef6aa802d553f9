//! Offline cache configuration

use bridge_traits::RetryPolicy;
use std::time::Duration;

/// Artist name stored when the uploader's display name cannot be resolved.
pub const UNKNOWN_ARTIST: &str = "Artista desconocido";

/// Configuration for the offline cache components.
#[derive(Debug, Clone)]
pub struct OfflineCacheConfig {
    /// SQLite URL of the local store (default: `sqlite://offline_music.db?mode=rwc`)
    pub database_url: String,

    /// How long a playback object URL stays valid (default: 5 minutes)
    pub object_url_ttl: Duration,

    /// Fallback artist name
    pub unknown_artist: String,

    /// Timeout for each binary fetch (default: 120s)
    pub download_timeout: Duration,

    /// Retry policy for binary fetches
    pub retry_policy: RetryPolicy,
}

impl Default for OfflineCacheConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://offline_music.db?mode=rwc".to_string(),
            object_url_ttl: Duration::from_secs(5 * 60),
            unknown_artist: UNKNOWN_ARTIST.to_string(),
            download_timeout: Duration::from_secs(120),
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl OfflineCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration backed by a private in-memory database.
    pub fn in_memory() -> Self {
        Self::default().with_database_url("sqlite::memory:")
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    pub fn with_object_url_ttl(mut self, ttl: Duration) -> Self {
        self.object_url_ttl = ttl;
        self
    }

    pub fn with_unknown_artist(mut self, name: impl Into<String>) -> Self {
        self.unknown_artist = name.into();
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.database_url.starts_with("sqlite:") {
            return Err(format!(
                "database_url must be a sqlite URL, got '{}'",
                self.database_url
            ));
        }

        if self.object_url_ttl.is_zero() {
            return Err("object_url_ttl must be greater than 0".to_string());
        }

        if self.download_timeout.is_zero() {
            return Err("download_timeout must be greater than 0".to_string());
        }

        if self.unknown_artist.trim().is_empty() {
            return Err("unknown_artist cannot be empty".to_string());
        }

        if self.retry_policy.max_attempts == 0 {
            return Err("retry_policy.max_attempts must be at least 1".to_string());
        }

        Ok(())
    }
}
