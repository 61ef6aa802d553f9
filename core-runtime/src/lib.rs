//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the offline music core:
//! - Logging and tracing bootstrap
//! - Configuration management
//! - Event bus
//!
//! Every other workspace crate depends on this one for its logging
//! conventions and for broadcasting state changes to the host.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
