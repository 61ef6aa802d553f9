//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-service`, `core-offline`). Host applications can
//! depend on `melodia-workspace` and enable the documented features without
//! wiring each crate individually.

#[cfg(any(feature = "desktop-shims", feature = "offline-cache"))]
pub use core_service as service;

#[cfg(feature = "offline-cache")]
pub use core_offline as offline;
