//! Logging walkthrough for an offline download
//!
//! Run with:
//! ```bash
//! cargo run --example logging_demo
//! cargo run --example logging_demo -- json
//! cargo run --example logging_demo -- compact "core_offline=trace"
//! ```

use bridge_traits::time::LogLevel;
use core_runtime::events::{CoreEvent, EventBus, OfflineEvent};
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LoggingConfig};
use std::env;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::default(),
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Trace)
        .with_pii_redaction(true)
        .with_spans(true);
    if let Some(filter) = args.get(2) {
        config = config.with_filter(filter.clone());
    }

    if let Err(e) = init_logging(config) {
        eprintln!("logging unavailable: {}", e);
        return;
    }

    let bus = EventBus::new(16);
    let mut events = bus.subscribe();

    download_song(&bus, "s1", "u1").await;

    while let Ok(event) = events.try_recv() {
        info!(severity = ?event.severity(), "{}", event.description());
    }

    info!(
        email = %redact_if_sensitive("email", "ana@example.com"),
        api_key = %redact_if_sensitive("api_key", "anon-key"),
        "Redacted session details"
    );
}

#[instrument(skip(bus))]
async fn download_song(bus: &EventBus, song_id: &str, user_id: &str) {
    let _ = bus.emit(CoreEvent::Offline(OfflineEvent::DownloadStarted {
        song_id: song_id.to_string(),
    }));
    info!("Starting offline download");

    fetch("audio", 4_812_331).await;
    warn!(song_id, "Cover art unavailable, storing song without it");

    let _ = bus.emit(CoreEvent::Offline(OfflineEvent::DownloadCompleted {
        song_id: song_id.to_string(),
        file_size: 4_812_331,
    }));
    info!(file_size = 4_812_331u64, "Song available offline");
}

#[instrument]
async fn fetch(asset: &str, bytes: u64) {
    tokio::time::sleep(Duration::from_millis(10)).await;
    debug!(bytes, "Fetched binary");
}
