//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` with retry and exponential backoff
//! - `NetworkMonitor` seeded by a reachability probe and driven by
//!   host-reported transitions
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopNetworkMonitor, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! let http_client = Arc::new(ReqwestHttpClient::new());
//! let network = Arc::new(DesktopNetworkMonitor::new());
//!
//! // Wire OS connectivity callbacks to the monitor:
//! network.set_online(false);
//! ```

mod http;
mod network;

pub use http::ReqwestHttpClient;
pub use network::DesktopNetworkMonitor;
