//! # Local Store
//!
//! SQLite-backed storage for offline songs. Three tables share the song id as
//! their key:
//!
//! - `offline_songs`: metadata, indexed by owning user and download time
//! - `offline_audio`: audio bytes
//! - `offline_images`: cover art bytes
//!
//! Multi-table writes always run inside one transaction so a song is either
//! fully present (metadata plus audio, image optional) or absent.

use crate::error::{OfflineError, Result};
use crate::models::{DownloadedSong, StorageUsage};
use bridge_traits::{SongId, UserId};
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS offline_songs (
        id TEXT PRIMARY KEY NOT NULL,
        titulo TEXT NOT NULL,
        artista TEXT NOT NULL,
        album TEXT,
        duracion INTEGER NOT NULL,
        archivo_url TEXT NOT NULL,
        imagen_url TEXT,
        downloaded_at INTEGER NOT NULL,
        file_size INTEGER NOT NULL,
        usuario_id TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_offline_songs_usuario ON offline_songs(usuario_id)",
    "CREATE INDEX IF NOT EXISTS idx_offline_songs_downloaded_at ON offline_songs(downloaded_at)",
    r#"
    CREATE TABLE IF NOT EXISTS offline_audio (
        song_id TEXT PRIMARY KEY NOT NULL
            REFERENCES offline_songs(id) ON DELETE CASCADE,
        data BLOB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS offline_images (
        song_id TEXT PRIMARY KEY NOT NULL
            REFERENCES offline_songs(id) ON DELETE CASCADE,
        data BLOB NOT NULL
    )
    "#,
];

const SONG_COLUMNS: &str = "id, titulo, artista, album, duracion, archivo_url, imagen_url, \
                            downloaded_at, file_size, usuario_id";

/// Connection settings for the local store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// Private in-memory database. Limited to one connection, since every
    /// SQLite connection to `:memory:` opens a separate database.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// Picks the in-memory settings for `:memory:` URLs.
    pub fn from_url(database_url: &str) -> Self {
        let config = Self::new(database_url);
        if config.is_in_memory() {
            Self::in_memory()
        } else {
            config
        }
    }

    fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:")
    }
}

/// Transactional store for downloaded songs and their blobs
pub struct LocalStore {
    config: StoreConfig,
    pool: OnceCell<SqlitePool>,
}

impl LocalStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
        }
    }

    /// Open the database and create tables. Safe to call repeatedly.
    pub async fn initialize(&self) -> Result<()> {
        self.pool().await.map(|_| ())
    }

    /// Pool handle, connecting and creating the schema on first use
    pub async fn pool(&self) -> Result<&SqlitePool> {
        self.pool
            .get_or_try_init(|| async {
                let pool = connect(&self.config).await?;
                for statement in SCHEMA {
                    sqlx::query(statement).execute(&pool).await.map_err(|e| {
                        OfflineError::StorageWrite(format!("schema: {}", e))
                    })?;
                }
                debug!("Offline store schema ready");
                Ok::<_, OfflineError>(pool)
            })
            .await
    }

    /// Songs downloaded by `user_id`, newest first
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<DownloadedSong>> {
        let pool = self.pool().await?;
        let sql = format!(
            "SELECT {} FROM offline_songs WHERE usuario_id = ? ORDER BY downloaded_at DESC, id",
            SONG_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_str())
            .fetch_all(pool)
            .await
            .map_err(read_err)?;

        rows.iter().map(song_from_row).collect()
    }

    pub async fn get_song(&self, song_id: &SongId) -> Result<Option<DownloadedSong>> {
        let pool = self.pool().await?;
        let sql = format!("SELECT {} FROM offline_songs WHERE id = ?", SONG_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(song_id.as_str())
            .fetch_optional(pool)
            .await
            .map_err(read_err)?;

        row.as_ref().map(song_from_row).transpose()
    }

    /// Write metadata, audio and optional image atomically.
    ///
    /// Overwrites any existing record with the same id. A stale image is
    /// removed when `image` is `None`.
    #[instrument(skip_all, fields(song_id = %song.id, audio_bytes = audio.len()))]
    pub async fn put(
        &self,
        song: &DownloadedSong,
        audio: &[u8],
        image: Option<&[u8]>,
    ) -> Result<()> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await.map_err(write_err)?;

        sqlx::query(
            r#"
            INSERT INTO offline_songs (
                id, titulo, artista, album, duracion, archivo_url, imagen_url,
                downloaded_at, file_size, usuario_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                titulo = excluded.titulo,
                artista = excluded.artista,
                album = excluded.album,
                duracion = excluded.duracion,
                archivo_url = excluded.archivo_url,
                imagen_url = excluded.imagen_url,
                downloaded_at = excluded.downloaded_at,
                file_size = excluded.file_size,
                usuario_id = excluded.usuario_id
            "#,
        )
        .bind(song.id.as_str())
        .bind(&song.titulo)
        .bind(&song.artista)
        .bind(song.album.as_deref())
        .bind(i64::from(song.duracion))
        .bind(&song.archivo_url)
        .bind(song.imagen_url.as_deref())
        .bind(song.downloaded_at.timestamp_millis())
        .bind(to_i64(song.file_size))
        .bind(song.usuario_id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        sqlx::query(
            "INSERT INTO offline_audio (song_id, data) VALUES (?, ?) \
             ON CONFLICT(song_id) DO UPDATE SET data = excluded.data",
        )
        .bind(song.id.as_str())
        .bind(audio)
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        match image {
            Some(image) => {
                sqlx::query(
                    "INSERT INTO offline_images (song_id, data) VALUES (?, ?) \
                     ON CONFLICT(song_id) DO UPDATE SET data = excluded.data",
                )
                .bind(song.id.as_str())
                .bind(image)
                .execute(&mut *tx)
                .await
                .map_err(write_err)?;
            }
            None => {
                sqlx::query("DELETE FROM offline_images WHERE song_id = ?")
                    .bind(song.id.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(write_err)?;
            }
        }

        tx.commit().await.map_err(write_err)?;

        info!(file_size = song.file_size, "Stored offline song");
        Ok(())
    }

    /// Remove a song and its blobs. Missing songs are not an error.
    #[instrument(skip_all, fields(song_id = %song_id))]
    pub async fn delete(&self, song_id: &SongId) -> Result<bool> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await.map_err(write_err)?;

        for table in ["offline_images", "offline_audio"] {
            sqlx::query(&format!("DELETE FROM {} WHERE song_id = ?", table))
                .bind(song_id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(write_err)?;
        }
        let removed = sqlx::query("DELETE FROM offline_songs WHERE id = ?")
            .bind(song_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(write_err)?
            .rows_affected();

        tx.commit().await.map_err(write_err)?;

        debug!(removed, "Deleted offline song");
        Ok(removed > 0)
    }

    pub async fn get_audio_blob(&self, song_id: &SongId) -> Result<Option<Bytes>> {
        self.get_blob("offline_audio", song_id).await
    }

    pub async fn get_image_blob(&self, song_id: &SongId) -> Result<Option<Bytes>> {
        self.get_blob("offline_images", song_id).await
    }

    async fn get_blob(&self, table: &str, song_id: &SongId) -> Result<Option<Bytes>> {
        let pool = self.pool().await?;
        let data: Option<Vec<u8>> =
            sqlx::query_scalar(&format!("SELECT data FROM {} WHERE song_id = ?", table))
                .bind(song_id.as_str())
                .fetch_optional(pool)
                .await
                .map_err(read_err)?;

        Ok(data.map(Bytes::from))
    }

    pub async fn usage_for_user(&self, user_id: &UserId) -> Result<StorageUsage> {
        let pool = self.pool().await?;
        let row = sqlx::query(
            "SELECT COUNT(*) AS song_count, COALESCE(SUM(file_size), 0) AS total_bytes \
             FROM offline_songs WHERE usuario_id = ?",
        )
        .bind(user_id.as_str())
        .fetch_one(pool)
        .await
        .map_err(read_err)?;

        let song_count: i64 = row.try_get("song_count").map_err(read_err)?;
        let total_bytes: i64 = row.try_get("total_bytes").map_err(read_err)?;

        Ok(StorageUsage {
            song_count: song_count.max(0) as u64,
            total_bytes: total_bytes.max(0) as u64,
        })
    }

    /// Delete every song owned by `user_id`. Returns the number removed.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn clear_user(&self, user_id: &UserId) -> Result<u64> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await.map_err(write_err)?;

        for table in ["offline_images", "offline_audio"] {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE song_id IN \
                 (SELECT id FROM offline_songs WHERE usuario_id = ?)",
                table
            ))
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }
        let removed = sqlx::query("DELETE FROM offline_songs WHERE usuario_id = ?")
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(write_err)?
            .rows_affected();

        tx.commit().await.map_err(write_err)?;

        info!(removed, "Cleared offline songs for user");
        Ok(removed)
    }

    /// Close the pool if it was opened.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }
}

async fn connect(config: &StoreConfig) -> Result<SqlitePool> {
    info!(database_url = %config.database_url, "Opening offline store");

    let mut options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| OfflineError::Config(format!("invalid database url: {}", e)))?
        .foreign_keys(true)
        .create_if_missing(true)
        .busy_timeout(config.busy_timeout);

    if !config.is_in_memory() {
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
    }

    let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections.max(1));
    if config.is_in_memory() {
        pool_options = pool_options
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    pool_options.connect_with(options).await.map_err(|e| {
        warn!(error = %e, "Failed to open offline store");
        OfflineError::StorageRead(format!("connect: {}", e))
    })
}

fn song_from_row(row: &SqliteRow) -> Result<DownloadedSong> {
    let downloaded_at: i64 = row.try_get("downloaded_at").map_err(read_err)?;
    let duracion: i64 = row.try_get("duracion").map_err(read_err)?;
    let file_size: i64 = row.try_get("file_size").map_err(read_err)?;
    let id: String = row.try_get("id").map_err(read_err)?;
    let usuario_id: String = row.try_get("usuario_id").map_err(read_err)?;

    Ok(DownloadedSong {
        id: SongId::new(id),
        titulo: row.try_get("titulo").map_err(read_err)?,
        artista: row.try_get("artista").map_err(read_err)?,
        album: row.try_get("album").map_err(read_err)?,
        duracion: u32::try_from(duracion).unwrap_or(0),
        archivo_url: row.try_get("archivo_url").map_err(read_err)?,
        imagen_url: row.try_get("imagen_url").map_err(read_err)?,
        downloaded_at: Utc
            .timestamp_millis_opt(downloaded_at)
            .single()
            .ok_or_else(|| {
                OfflineError::StorageRead(format!("invalid downloaded_at: {}", downloaded_at))
            })?,
        file_size: file_size.max(0) as u64,
        usuario_id: UserId::new(usuario_id),
    })
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn read_err(e: sqlx::Error) -> OfflineError {
    OfflineError::StorageRead(e.to_string())
}

fn write_err(e: sqlx::Error) -> OfflineError {
    OfflineError::StorageWrite(e.to_string())
}
