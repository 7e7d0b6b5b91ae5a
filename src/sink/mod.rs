//! # Sink Module
//!
//! The consumer capability for decoded telemetry samples.
//!
//! A sink is an independent consumer: the broker gives each registered sink
//! its own bounded queue and its own consumption loop, so one slow or broken
//! sink never affects ingestion or its siblings. The three reference sinks
//! mirror the consumers of the original ground-station tooling:
//!
//! - [`MapTrailSink`]: breadcrumb trail for the map renderer
//! - [`RollingSeriesSink`]: rolling windows for the time-series charts
//! - [`TelemetryPushSink`]: JSON push feed for the mission-control display

pub mod map_trail;
pub mod push;
pub mod rolling;

pub use map_trail::{MapTrailSink, TrailPoint, TrailSnapshot};
pub use push::TelemetryPushSink;
pub use rolling::{RollingSeriesSink, SeriesSnapshot};

use async_trait::async_trait;
use thiserror::Error;

use crate::frame::TelemetrySample;

/// Sink-side processing errors.
///
/// These never propagate past the sink's own consumption loop; the broker
/// counts and logs them and moves on.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink's downstream endpoint is unreachable; samples are being
    /// discarded until it comes back
    #[error("sink endpoint unavailable: {0}")]
    Unavailable(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An independent consumer of decoded telemetry samples.
///
/// `accept` is invoked only from the sink's own consumption loop, never
/// concurrently with itself for the same instance.
#[async_trait]
pub trait Sink: Send {
    /// Stable name used in logs and counter snapshots
    fn name(&self) -> &str;

    /// Consume one sample
    async fn accept(&mut self, sample: &TelemetrySample) -> Result<(), SinkError>;
}
