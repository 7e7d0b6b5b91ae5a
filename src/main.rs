//! # HABET Telemetry Broker
//!
//! Reads the balloon tracker's serial telemetry stream, decodes `$$HAR`
//! frames and fans the samples out to the map-trail, rolling-series and
//! mission-control push sinks until Ctrl+C or fatal source loss.

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use habet_broker::broker::Broker;
use habet_broker::config::Config;
use habet_broker::serial::port_trait::TtyOpener;
use habet_broker::serial::SerialSource;
use habet_broker::sink::{MapTrailSink, RollingSeriesSink, TelemetryPushSink};

/// Configuration file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(writer)
        .init();

    info!("HABET broker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)?;
    info!("configuration loaded from {}", config_path);

    let opener = TtyOpener::new(&config.serial.port, config.serial.baud_rate);
    let source = SerialSource::new(Box::new(opener), &config.serial);

    let mut broker = Broker::new(source, config.broker.queue_capacity);

    // Snapshot receivers go to the rendering layers; the broker only
    // needs the sinks themselves.
    let (map_sink, _trail_rx) = MapTrailSink::new();
    broker.register(Box::new(map_sink));

    let (series_sink, _series_rx) = RollingSeriesSink::new(config.broker.window_capacity);
    broker.register(Box::new(series_sink));

    if config.push.enabled {
        broker.register(Box::new(TelemetryPushSink::new(&config.push)));
    }

    let mut handle = broker.spawn();
    info!(
        "pipeline running on {} at {} baud",
        config.serial.port, config.serial.baud_rate
    );
    info!("Press Ctrl+C to exit");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        result = handle.ingestion_finished() => {
            match result {
                Ok(()) => info!("ingestion finished"),
                Err(e) => error!("ingestion stopped: {}", e),
            }
        }
    }

    handle.shutdown().await;

    let snapshot = handle.snapshot();
    info!(
        "frames received: {}, malformed: {}, decoded: {}",
        snapshot.frames_received, snapshot.frames_malformed, snapshot.frames_decoded
    );
    for sink in &snapshot.sinks {
        info!(
            "sink {}: enqueued {}, delivered {}, dropped {}, errors {}",
            sink.name, sink.enqueued, sink.delivered, sink.dropped, sink.errors
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path_exists() {
        assert!(std::path::Path::new(DEFAULT_CONFIG_PATH).exists());
    }
}
