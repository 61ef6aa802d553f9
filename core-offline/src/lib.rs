//! # Offline Music Cache
//!
//! Lets a signed-in user download songs for playback without network access.
//!
//! ## Overview
//!
//! - Songs are fetched from the remote catalog and committed atomically to a
//!   local SQLite store (metadata, audio and optional cover art)
//! - Every record belongs to the user who downloaded it and is only listed
//!   for that user
//! - Stored songs are played through short-lived object URLs
//! - The downloaded-songs view is refreshed when connectivity returns
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐     ┌──────────────────────┐
//! │   DownloadOrchestrator   │────>│  ConnectivityMonitor │
//! │  - download_song()       │     └──────────▲───────────┘
//! │  - status()              │                │
//! └───┬──────────┬───────────┘     ┌──────────┴───────────┐
//!     │          │                 │   SyncCoordinator    │
//!     │          ├──> RemoteCatalog│  - sync_with_server()│
//!     │          ├──> HttpClient   └──────────┬───────────┘
//!     │          └──> SessionProvider         │
//!     ▼                                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │                    LocalStore                        │
//! │  offline_songs | offline_audio | offline_images      │
//! └──────────────────────────▲───────────────────────────┘
//!                            │
//!                 ┌──────────┴───────────┐
//!                 │   PlaybackResolver   │
//!                 │  - play_offline_song │
//!                 └──────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_offline::{DownloadOrchestrator, PlaybackResolver};
//!
//! if orchestrator.download_song(&song_id, &user_id).await {
//!     let url = resolver.play_offline_song(&song_id).await;
//! }
//! ```

pub mod config;
pub mod connectivity;
pub mod downloader;
pub mod error;
pub mod models;
pub mod resolver;
pub mod store;
pub mod sync;

pub use config::{OfflineCacheConfig, UNKNOWN_ARTIST};
pub use connectivity::ConnectivityMonitor;
pub use downloader::DownloadOrchestrator;
pub use error::{OfflineError, Result};
pub use models::{DownloadedSong, OfflineStatus, StorageUsage};
pub use resolver::{AssetKind, ObjectUrl, ObjectUrlRegistry, PlaybackResolver, ResolvedObject};
pub use store::{LocalStore, StoreConfig};
pub use sync::{SkipReason, SyncCoordinator, SyncOutcome};
