//! Breadcrumb-trail sink backing the live map view.

use async_trait::async_trait;
use tokio::sync::watch;

use super::{Sink, SinkError};
use crate::frame::TelemetrySample;

/// One position fix on the trail
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Renderable view of the trail: the full point history plus the latest fix
/// (the map centers on it and draws its marker popup).
#[derive(Debug, Clone, Default)]
pub struct TrailSnapshot {
    pub points: Vec<TrailPoint>,
    pub latest: Option<TrailPoint>,
}

/// Appends every sample's position to an append-only breadcrumb trail and
/// republishes a snapshot after each point for the map renderer to poll.
///
/// The trail grows monotonically for the session and is cleared only by an
/// explicit [`reset`](Self::reset). Never fails on valid input.
pub struct MapTrailSink {
    trail: Vec<TrailPoint>,
    snapshot_tx: watch::Sender<TrailSnapshot>,
}

impl MapTrailSink {
    /// Create the sink and the snapshot receiver handed to the renderer
    pub fn new() -> (Self, watch::Receiver<TrailSnapshot>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(TrailSnapshot::default());
        (
            Self {
                trail: Vec::new(),
                snapshot_tx,
            },
            snapshot_rx,
        )
    }

    /// Clear the trail and publish the empty snapshot
    pub fn reset(&mut self) {
        self.trail.clear();
        self.publish(None);
    }

    fn publish(&self, latest: Option<TrailPoint>) {
        let _ = self.snapshot_tx.send(TrailSnapshot {
            points: self.trail.clone(),
            latest,
        });
    }
}

#[async_trait]
impl Sink for MapTrailSink {
    fn name(&self) -> &str {
        "map-trail"
    }

    async fn accept(&mut self, sample: &TelemetrySample) -> Result<(), SinkError> {
        let point = TrailPoint {
            latitude: sample.latitude,
            longitude: sample.longitude,
            altitude: sample.altitude,
        };
        self.trail.push(point);
        self.publish(Some(point));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{codec, CaptureTime};

    fn sample(lat: f64, lon: f64, alt: f64) -> TelemetrySample {
        let line = format!(
            "$$HAR,{},{},{},0,0,0,0,0,0,0,0",
            (lat * 10_000_000.0).round() as i64,
            (lon * 10_000_000.0).round() as i64,
            (alt * 1_000.0).round() as i64,
        );
        codec::decode(&line, CaptureTime::now()).unwrap()
    }

    #[tokio::test]
    async fn test_trail_grows_in_order() {
        let (mut sink, rx) = MapTrailSink::new();

        sink.accept(&sample(42.0, -93.6, 100.0)).await.unwrap();
        sink.accept(&sample(42.1, -93.7, 200.0)).await.unwrap();
        sink.accept(&sample(42.2, -93.8, 300.0)).await.unwrap();

        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.points.len(), 3);
        assert!((snapshot.points[0].altitude - 100.0).abs() < 1e-9);
        assert!((snapshot.points[2].altitude - 300.0).abs() < 1e-9);

        let latest = snapshot.latest.unwrap();
        assert!((latest.latitude - 42.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_reset_clears_trail() {
        let (mut sink, rx) = MapTrailSink::new();

        sink.accept(&sample(42.0, -93.6, 100.0)).await.unwrap();
        sink.reset();

        let snapshot = rx.borrow().clone();
        assert!(snapshot.points.is_empty());
        assert!(snapshot.latest.is_none());

        // The trail keeps working after a reset
        sink.accept(&sample(41.0, -92.0, 50.0)).await.unwrap();
        assert_eq!(rx.borrow().points.len(), 1);
    }
}
