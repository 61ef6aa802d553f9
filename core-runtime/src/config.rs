//! # Core Configuration Module
//!
//! Builder-based configuration for the offline music core.
//!
//! ## Overview
//!
//! `CoreConfig` holds the settings and injected bridges the service façade
//! needs. The builder validates eagerly so a misconfigured host fails at
//! startup rather than on the first download.
//!
//! ## Required Settings
//!
//! - `database_path` - location of the offline store (`:memory:` allowed)
//! - `catalog` - base URL and API key of the remote catalog
//!
//! ## Bridges (with platform defaults)
//!
//! - `HttpClient` - required; desktop default: reqwest
//! - `NetworkMonitor` - optional; desktop default: probe plus host-reported transitions
//!
//! With the `desktop-shims` feature the builder fills in missing bridges
//! with the `bridge-desktop` implementations. Without it, a missing
//! `HttpClient` is reported as [`Error::CapabilityMissing`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CatalogApiConfig, CoreConfig};
//!
//! let config = CoreConfig::builder()
//!     .database_path("/home/ana/.local/share/melodia/offline.db")
//!     .catalog(CatalogApiConfig::new("https://xyz.supabase.co", "anon-key"))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, NetworkMonitor};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default lifetime of an object URL handed out for playback.
pub const DEFAULT_OBJECT_URL_TTL: Duration = Duration::from_secs(5 * 60);

/// Core configuration
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database holding downloaded songs
    pub database_path: PathBuf,

    /// Remote catalog endpoint
    pub catalog: CatalogApiConfig,

    /// Lifetime of playback object URLs
    pub object_url_ttl: Duration,

    /// HTTP client used for catalog queries and binary downloads
    pub http_client: Arc<dyn HttpClient>,

    /// Platform connectivity signal. `None` means the host pushes
    /// transitions itself and the core starts in the online state.
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,

    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("catalog", &self.catalog)
            .field("object_url_ttl", &self.object_url_ttl)
            .field("http_client", &"HttpClient { ... }")
            .field(
                "network_monitor",
                &self
                    .network_monitor
                    .as_ref()
                    .map(|_| "NetworkMonitor { ... }"),
            )
            .field("features", &self.features)
            .finish()
    }
}

/// Feature toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Refresh the downloaded-songs view whenever connectivity returns
    pub auto_sync_on_reconnect: bool,

    /// Require a `NetworkMonitor`; downloads are gated on its signal
    pub enable_network_awareness: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            auto_sync_on_reconnect: true,
            enable_network_awareness: true,
        }
    }
}

/// Remote catalog endpoint settings
#[derive(Clone, PartialEq, Eq)]
pub struct CatalogApiConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,
    /// Anonymous API key sent as `apikey` and bearer token
    pub api_key: String,
    pub songs_table: String,
    pub users_table: String,
}

impl std::fmt::Debug for CatalogApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("songs_table", &self.songs_table)
            .field("users_table", &self.users_table)
            .finish()
    }
}

impl CatalogApiConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            songs_table: "canciones".to_string(),
            users_table: "usuarios".to_string(),
        }
    }

    pub fn with_songs_table(mut self, table: impl Into<String>) -> Self {
        self.songs_table = table.into();
        self
    }

    pub fn with_users_table(mut self, table: impl Into<String>) -> Self {
        self.users_table = table.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(Error::Config(format!(
                "Catalog base URL must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }

        if self.api_key.trim().is_empty() {
            return Err(Error::Config("Catalog API key cannot be empty".to_string()));
        }

        if self.songs_table.is_empty() || self.users_table.is_empty() {
            return Err(Error::Config("Catalog table names cannot be empty".to_string()));
        }

        Ok(())
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        self.catalog.validate()?;

        if self.object_url_ttl.is_zero() {
            return Err(Error::Config(
                "Object URL TTL must be greater than zero".to_string(),
            ));
        }

        if self.features.enable_network_awareness && self.network_monitor.is_none() {
            return Err(Error::Config(
                "Network awareness enabled but no NetworkMonitor provided. \
                 Disable the feature or inject a NetworkMonitor implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// SQLite connection URL for [`database_path`](Self::database_path)
    pub fn database_url(&self) -> String {
        let path = self.database_path.to_string_lossy();
        if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}?mode=rwc", path)
        }
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Ok(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                  Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                  Mobile: inject a platform-native adapter."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_network_monitor() -> Option<Arc<dyn NetworkMonitor>> {
    Some(Arc::new(bridge_desktop::DesktopNetworkMonitor::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_network_monitor() -> Option<Arc<dyn NetworkMonitor>> {
    None
}

/// Builder for [`CoreConfig`]
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    catalog: Option<CatalogApiConfig>,
    object_url_ttl: Option<Duration>,
    http_client: Option<Arc<dyn HttpClient>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn catalog(mut self, catalog: CatalogApiConfig) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn object_url_ttl(mut self, ttl: Duration) -> Self {
        self.object_url_ttl = Some(ttl);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn auto_sync_on_reconnect(mut self, enabled: bool) -> Self {
        self.features.auto_sync_on_reconnect = enabled;
        self
    }

    pub fn enable_network_awareness(mut self, enabled: bool) -> Self {
        self.features.enable_network_awareness = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let catalog = self.catalog.ok_or_else(|| {
            Error::Config("Catalog endpoint is required. Use .catalog() to set it.".to_string())
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let network_monitor = self
            .network_monitor
            .or_else(|| {
                if self.features.enable_network_awareness {
                    provide_default_network_monitor()
                } else {
                    None
                }
            });

        let config = CoreConfig {
            database_path,
            catalog,
            object_url_ttl: self.object_url_ttl.unwrap_or(DEFAULT_OBJECT_URL_TTL),
            http_client,
            network_monitor,
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
