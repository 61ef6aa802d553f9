//! # Offline Cache Error Types
//!
//! Every failure mode of the download, storage and playback paths. The
//! orchestrator collapses these to a boolean at its public boundary, so the
//! variants mainly drive logging and events.

use bridge_traits::BridgeError;
use core_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OfflineError {
    // ========================================================================
    // Preconditions
    // ========================================================================
    /// No signed-in user, or a different user than the one requested.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The platform reports no connectivity.
    #[error("Device is offline")]
    Offline,

    // ========================================================================
    // Remote Errors
    // ========================================================================
    /// Song record or audio bytes could not be fetched. Aborts the download.
    #[error("Remote fetch failed: {0}")]
    RemoteFetch(String),

    /// Artist name or cover image could not be fetched. Never aborts.
    #[error("Optional asset unavailable: {0}")]
    OptionalAsset(String),

    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// The write transaction aborted; nothing was committed.
    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    #[error("Storage read failed: {0}")]
    StorageRead(String),

    /// The catalog has no song with this id.
    #[error("Song not found: {0}")]
    NotFound(String),

    #[error("Invalid offline cache configuration: {0}")]
    Config(String),
}

impl OfflineError {
    /// Whether retrying later might succeed without any user action
    pub fn is_transient(&self) -> bool {
        matches!(self, OfflineError::Offline | OfflineError::RemoteFetch(_))
    }

    /// Whether the download was refused before any I/O happened
    pub fn is_precondition(&self) -> bool {
        matches!(self, OfflineError::Offline | OfflineError::NotAuthenticated)
    }
}

impl From<BridgeError> for OfflineError {
    fn from(err: BridgeError) -> Self {
        OfflineError::RemoteFetch(err.to_string())
    }
}

impl From<AuthError> for OfflineError {
    fn from(_: AuthError) -> Self {
        OfflineError::NotAuthenticated
    }
}

pub type Result<T> = std::result::Result<T, OfflineError>;
