//! Catalog API row types
//!
//! Rows arrive as JSON arrays. Numeric primary keys are accepted as well as
//! text ones.

use bridge_traits::{RemoteSong, RemoteUser, SongId, UserId};
use serde::{Deserialize, Serialize};

/// Column list requested for song rows
pub const SONG_COLUMNS: &str = "id,titulo,archivo_audio,imagen_url,usuario_id,duracion,album";

/// Column list requested for user rows
pub const USER_COLUMNS: &str = "nombre_usuario";

/// Primary key that may be serialized as text or number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Text(String),
    Number(i64),
}

impl RowId {
    pub fn into_string(self) -> String {
        match self {
            RowId::Text(text) => text,
            RowId::Number(number) => number.to_string(),
        }
    }
}

/// `canciones` row
#[derive(Debug, Clone, Deserialize)]
pub struct SongRow {
    pub id: RowId,
    pub titulo: String,
    pub archivo_audio: String,
    #[serde(default)]
    pub imagen_url: Option<String>,
    pub usuario_id: RowId,
    /// Seconds; some rows store fractional values
    #[serde(default)]
    pub duracion: Option<f64>,
    #[serde(default)]
    pub album: Option<String>,
}

impl From<SongRow> for RemoteSong {
    fn from(row: SongRow) -> Self {
        Self {
            id: SongId::new(row.id.into_string()),
            titulo: row.titulo,
            archivo_audio: row.archivo_audio,
            imagen_url: row.imagen_url.filter(|url| !url.trim().is_empty()),
            usuario_id: UserId::new(row.usuario_id.into_string()),
            duracion: row
                .duracion
                .filter(|d| d.is_finite() && *d > 0.0)
                .map(|d| d.round().min(u32::MAX as f64) as u32)
                .unwrap_or(0),
            album: row.album.filter(|album| !album.trim().is_empty()),
        }
    }
}

/// `usuarios` row
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserRow {
    #[serde(default)]
    pub nombre_usuario: Option<String>,
}

impl From<UserRow> for RemoteUser {
    fn from(row: UserRow) -> Self {
        Self {
            nombre_usuario: row.nombre_usuario.filter(|name| !name.trim().is_empty()),
        }
    }
}
