//! # Remote Catalog Provider
//!
//! Implements `RemoteCatalog` over a PostgREST-style HTTP API.
//!
//! ## Overview
//!
//! This module provides:
//! - Song lookup by id (`titulo`, `archivo_audio`, `imagen_url`, ...)
//! - Uploader lookup for the artist display name
//! - API key authentication via `apikey` and bearer headers
//! - Retry with exponential backoff on 429 and 5xx responses

pub mod connector;
pub mod error;
pub mod types;

pub use connector::RestCatalogConnector;
pub use error::{CatalogError, Result};
