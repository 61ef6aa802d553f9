//! Remote Catalog Abstraction
//!
//! Lookups against the remote music catalog: song records and the user
//! records that carry an artist's display name.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Identifier of a song in the remote catalog.
///
/// The catalog owns the format; the core treats it as an opaque string.
///
/// # Examples
///
/// ```
/// use bridge_traits::SongId;
///
/// let id = SongId::new("a1b2");
/// assert_eq!(id.as_str(), "a1b2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongId(String);

impl SongId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SongId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SongId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of a catalog user (listener or uploading artist).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Song record as published by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSong {
    pub id: SongId,
    pub titulo: String,
    /// Location of the audio file
    pub archivo_audio: String,
    pub imagen_url: Option<String>,
    /// Uploading artist
    pub usuario_id: UserId,
    /// Duration in seconds
    pub duracion: u32,
    pub album: Option<String>,
}

/// User record; only the display name is of interest here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub nombre_usuario: Option<String>,
}

/// Remote catalog trait
///
/// Implementations return `Ok(None)` when the record does not exist and an
/// error when the lookup itself failed.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// Fetch a song record by id
    async fn get_song(&self, id: &SongId) -> Result<Option<RemoteSong>>;

    /// Fetch a user record by id
    async fn get_user(&self, id: &UserId) -> Result<Option<RemoteUser>>;
}
