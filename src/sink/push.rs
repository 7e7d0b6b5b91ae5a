//! Push sink feeding the mission-control telemetry display.
//!
//! The original ground station forwarded every decoded frame to an OpenMCT
//! bridge as a JSON message over a persistent connection. This sink keeps
//! that wire shape: one newline-terminated JSON object per sample,
//!
//! ```json
//! {"timestamp": 1700000000000, "data": {"latitude": 42.035, ...}}
//! ```
//!
//! sent over an outbound TCP connection. Send failures trigger a bounded
//! reconnect-with-backoff; once the budget is spent the sink reports
//! [`SinkError::Unavailable`] per sample (with a single cheap reconnect
//! attempt each time) until the endpoint comes back. All retrying happens
//! on the sink's own consumption loop, never on the broker's enqueue path.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::sleep;
use tracing::{info, warn};

use super::{Sink, SinkError};
use crate::config::PushConfig;
use crate::frame::TelemetrySample;

pub struct TelemetryPushSink {
    endpoint: String,
    conn: Option<TcpStream>,
    retry_min_delay: Duration,
    retry_max_delay: Duration,
    max_retries: u32,
}

impl std::fmt::Debug for TelemetryPushSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryPushSink")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.conn.is_some())
            .finish_non_exhaustive()
    }
}

impl TelemetryPushSink {
    pub fn new(config: &PushConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            conn: None,
            retry_min_delay: Duration::from_millis(config.retry_min_delay_ms),
            retry_max_delay: Duration::from_millis(config.retry_max_delay_ms),
            max_retries: config.max_retries,
        }
    }

    /// Flat external representation of one sample, newline terminated.
    /// The reserved frame field is deliberately absent: mission control
    /// only consumes the documented metrics.
    fn encode(sample: &TelemetrySample) -> Vec<u8> {
        let message = serde_json::json!({
            "timestamp": sample.captured.epoch_millis(),
            "data": {
                "latitude": sample.latitude,
                "longitude": sample.longitude,
                "altitude": sample.altitude,
                "temperature": sample.temperature,
                "pressure": sample.pressure,
                "humidity": sample.humidity,
                "battery": sample.battery,
                "speed": sample.speed,
                "pdop": sample.pdop,
                "heading": sample.heading,
            },
        });
        let mut bytes = message.to_string().into_bytes();
        bytes.push(b'\n');
        bytes
    }

    async fn connect(&mut self) -> std::io::Result<()> {
        let stream = TcpStream::connect(&self.endpoint).await?;
        info!("push sink connected to {}", self.endpoint);
        self.conn = Some(stream);
        Ok(())
    }

    async fn try_send(&mut self, message: &[u8]) -> std::io::Result<()> {
        match self.conn.as_mut() {
            Some(conn) => {
                conn.write_all(message).await?;
                conn.flush().await
            }
            None => Err(std::io::Error::from(std::io::ErrorKind::NotConnected)),
        }
    }

    /// Bounded reconnect after a mid-session send failure
    async fn reconnect_with_backoff(&mut self) -> bool {
        let mut delay = self.retry_min_delay;
        for attempt in 1..=self.max_retries {
            sleep(delay).await;
            match self.connect().await {
                Ok(()) => return true,
                Err(e) => warn!(attempt, "push reconnect to {} failed: {}", self.endpoint, e),
            }
            delay = (delay * 2).min(self.retry_max_delay);
        }
        false
    }
}

#[async_trait]
impl Sink for TelemetryPushSink {
    fn name(&self) -> &str {
        "telemetry-push"
    }

    async fn accept(&mut self, sample: &TelemetrySample) -> Result<(), SinkError> {
        let message = Self::encode(sample);

        // While degraded, each sample gets one cheap connect attempt; the
        // full backoff budget is reserved for mid-session failures.
        if self.conn.is_none() {
            if let Err(e) = self.connect().await {
                return Err(SinkError::Unavailable(format!("{}: {}", self.endpoint, e)));
            }
        }

        if let Err(e) = self.try_send(&message).await {
            warn!("push send to {} failed: {}", self.endpoint, e);
            self.conn = None;

            if self.reconnect_with_backoff().await && self.try_send(&message).await.is_ok() {
                return Ok(());
            }
            self.conn = None;
            return Err(SinkError::Unavailable(self.endpoint.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{codec, CaptureTime};
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;

    const GOLDEN_LINE: &str =
        "$$HAR,420350000,-936130000,350000,1500000,120,15,101300,2500,45000,0,12.1";

    fn sample() -> TelemetrySample {
        codec::decode(GOLDEN_LINE, CaptureTime::now()).unwrap()
    }

    fn push_config(endpoint: String) -> PushConfig {
        PushConfig {
            enabled: true,
            endpoint,
            retry_min_delay_ms: 1,
            retry_max_delay_ms: 4,
            max_retries: 2,
        }
    }

    #[tokio::test]
    async fn test_sends_one_json_message_per_sample() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(stream).lines();
            lines.next_line().await.unwrap().unwrap()
        });

        let mut sink = TelemetryPushSink::new(&push_config(endpoint));
        let sample = sample();
        assert_ok!(sink.accept(&sample).await);

        let received = server.await.unwrap();
        let message: serde_json::Value = serde_json::from_str(&received).unwrap();

        assert_eq!(
            message["timestamp"].as_i64().unwrap(),
            sample.captured.epoch_millis()
        );
        let data = &message["data"];
        assert!((data["latitude"].as_f64().unwrap() - 42.035).abs() < 1e-9);
        assert!((data["longitude"].as_f64().unwrap() - (-93.613)).abs() < 1e-9);
        assert!((data["altitude"].as_f64().unwrap() - 350.0).abs() < 1e-9);
        assert!((data["battery"].as_f64().unwrap() - 12.1).abs() < 1e-9);
        assert!((data["heading"].as_f64().unwrap() - 15.0).abs() < 1e-9);
        // The reserved frame field never leaves the process
        assert!(data.get("reserved").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_unavailable() {
        // Grab a port with no listener behind it
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut sink = TelemetryPushSink::new(&push_config(endpoint));

        let result = sink.accept(&sample()).await;
        assert!(matches!(result, Err(SinkError::Unavailable(_))));

        // Still unavailable on the next sample, still not panicking
        let result = sink.accept(&sample()).await;
        assert!(matches!(result, Err(SinkError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_recovers_once_endpoint_returns() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut sink = TelemetryPushSink::new(&push_config(addr.to_string()));
        assert!(sink.accept(&sample()).await.is_err());

        // Endpoint comes back on the same address
        let listener = TcpListener::bind(addr).await.unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(stream).lines();
            lines.next_line().await.unwrap().unwrap()
        });

        sink.accept(&sample()).await.unwrap();
        let received = server.await.unwrap();
        assert!(received.contains("\"timestamp\""));
    }
}
