//! Rolling-window sink backing the time-series charts.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::watch;

use super::{Sink, SinkError};
use crate::frame::TelemetrySample;

/// Fixed-capacity FIFO of recent values for one metric
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be non-zero");
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a value, evicting the oldest once at capacity
    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
}

/// Consistent view of all four chart windows at one sequence position.
/// `sequence` counts accepted samples, so a poller can tell whether
/// anything changed since its last read.
#[derive(Debug, Clone, Default)]
pub struct SeriesSnapshot {
    pub sequence: u64,
    pub altitude: Vec<f64>,
    pub temperature: Vec<f64>,
    pub pressure: Vec<f64>,
    pub humidity: Vec<f64>,
}

/// Maintains one rolling window per charted metric and republishes a
/// consistent snapshot of all four after every sample.
///
/// The original dashboards plotted altitude, temperature, pressure and
/// humidity over the last 50 points; the capacity is configurable.
pub struct RollingSeriesSink {
    altitude: RollingWindow,
    temperature: RollingWindow,
    pressure: RollingWindow,
    humidity: RollingWindow,
    sequence: u64,
    snapshot_tx: watch::Sender<SeriesSnapshot>,
}

impl RollingSeriesSink {
    /// Create the sink and the snapshot receiver handed to the chart layer
    pub fn new(capacity: usize) -> (Self, watch::Receiver<SeriesSnapshot>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(SeriesSnapshot::default());
        (
            Self {
                altitude: RollingWindow::new(capacity),
                temperature: RollingWindow::new(capacity),
                pressure: RollingWindow::new(capacity),
                humidity: RollingWindow::new(capacity),
                sequence: 0,
                snapshot_tx,
            },
            snapshot_rx,
        )
    }
}

#[async_trait]
impl Sink for RollingSeriesSink {
    fn name(&self) -> &str {
        "rolling-series"
    }

    async fn accept(&mut self, sample: &TelemetrySample) -> Result<(), SinkError> {
        self.altitude.push(sample.altitude);
        self.temperature.push(sample.temperature);
        self.pressure.push(sample.pressure);
        self.humidity.push(sample.humidity);
        self.sequence += 1;

        let _ = self.snapshot_tx.send(SeriesSnapshot {
            sequence: self.sequence,
            altitude: self.altitude.to_vec(),
            temperature: self.temperature.to_vec(),
            pressure: self.pressure.to_vec(),
            humidity: self.humidity.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{codec, CaptureTime};

    fn sample(alt_m: f64, temp_c: f64) -> TelemetrySample {
        let line = format!(
            "$$HAR,0,0,{},0,0,0,101300,{},50000,0,12.0",
            (alt_m * 1_000.0).round() as i64,
            (temp_c * 100.0).round() as i64,
        );
        codec::decode(&line, CaptureTime::now()).unwrap()
    }

    #[test]
    fn test_window_evicts_oldest_fifo() {
        let mut window = RollingWindow::new(3);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            window.push(v);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.to_vec(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    #[should_panic(expected = "capacity must be non-zero")]
    fn test_zero_capacity_window_is_rejected() {
        RollingWindow::new(0);
    }

    #[tokio::test]
    async fn test_snapshot_is_consistent_across_metrics() {
        let (mut sink, rx) = RollingSeriesSink::new(2);

        sink.accept(&sample(100.0, 20.0)).await.unwrap();
        sink.accept(&sample(200.0, 10.0)).await.unwrap();
        sink.accept(&sample(300.0, 0.0)).await.unwrap();

        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.sequence, 3);
        // All windows sit at the same sequence position after eviction
        assert_eq!(snapshot.altitude, vec![200.0, 300.0]);
        assert_eq!(snapshot.temperature, vec![10.0, 0.0]);
        assert_eq!(snapshot.pressure.len(), 2);
        assert_eq!(snapshot.humidity.len(), 2);
    }
}
