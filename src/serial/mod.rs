//! # Serial Source Module
//!
//! Owns the line-oriented serial input from the balloon tracker.
//!
//! This module handles:
//! - Opening the configured device at a fixed baud rate (8N1)
//! - Timestamping and forwarding every non-empty line
//! - Bounded-timeout reads so the ingestion loop never blocks forever
//! - Reconnection with exponential backoff after I/O failures
//! - A terminal `Fatal` state once the reconnect budget is exhausted

pub mod port_trait;

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

use crate::config::SerialConfig;
use crate::frame::CaptureTime;
use port_trait::{PortOpener, PortReader};

/// Connection state of the serial source, readable by monitoring callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Device open, lines flowing
    Connected,
    /// Device lost, retrying with backoff
    Reconnecting,
    /// Reconnect budget exhausted; the source produces nothing further
    Fatal,
}

/// One raw line as delivered by the device, timestamped at arrival.
/// Ephemeral: discarded after the decode attempt.
#[derive(Debug, Clone)]
pub struct RawLine {
    pub text: String,
    pub captured: CaptureTime,
}

/// Serial line source with reconnect/backoff.
///
/// Produces an effectively infinite sequence of [`RawLine`] via
/// [`next_line`](Self::next_line); `None` means the source went [`Fatal`]
/// and will never produce again.
///
/// [`Fatal`]: ConnectionState::Fatal
pub struct SerialSource {
    opener: Box<dyn PortOpener>,
    reader: Option<BufReader<PortReader>>,
    /// Persistent line buffer; `read_until` is cancel safe, so bytes read
    /// before a timeout stay here for the next attempt.
    buf: Vec<u8>,
    read_timeout: Duration,
    min_delay: Duration,
    max_delay: Duration,
    max_failures: u32,
    consecutive_failures: u32,
    fatal: bool,
    state_tx: watch::Sender<ConnectionState>,
}

impl std::fmt::Debug for SerialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialSource")
            .field("state", &*self.state_tx.borrow())
            .field("consecutive_failures", &self.consecutive_failures)
            .finish_non_exhaustive()
    }
}

impl SerialSource {
    pub fn new(opener: Box<dyn PortOpener>, config: &SerialConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Reconnecting);
        Self {
            opener,
            reader: None,
            buf: Vec::new(),
            read_timeout: Duration::from_millis(config.read_timeout_ms),
            min_delay: Duration::from_millis(config.reconnect_min_delay_ms),
            max_delay: Duration::from_millis(config.reconnect_max_delay_ms),
            max_failures: config.max_reconnect_failures,
            consecutive_failures: 0,
            fatal: false,
            state_tx,
        }
    }

    /// Watch channel carrying the current connection state
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Produce the next timestamped line.
    ///
    /// Read timeouts and empty lines loop internally without producing;
    /// I/O failures go through the reconnect path. Returns `None` once the
    /// source is `Fatal`, immediately and forever.
    pub async fn next_line(&mut self) -> Option<RawLine> {
        loop {
            if self.fatal {
                return None;
            }

            if self.reader.is_none() && !self.reopen().await {
                return None;
            }

            let reader = self.reader.as_mut().unwrap();
            match timeout(self.read_timeout, reader.read_until(b'\n', &mut self.buf)).await {
                // Timeout with no complete line: a no-op, not a failure
                Err(_elapsed) => continue,

                // EOF: the device went away
                Ok(Ok(0)) => {
                    warn!("serial device hit EOF, reconnecting");
                    self.disconnect();
                }

                Ok(Ok(_)) => {
                    if !self.buf.ends_with(b"\n") {
                        // Partial line right before EOF; the next read
                        // returns 0 and takes the reconnect path.
                        continue;
                    }
                    let text = String::from_utf8_lossy(&self.buf).trim().to_string();
                    self.buf.clear();
                    self.consecutive_failures = 0;
                    if text.is_empty() {
                        continue;
                    }
                    return Some(RawLine {
                        text,
                        captured: CaptureTime::now(),
                    });
                }

                Ok(Err(e)) => {
                    warn!("serial read failed: {}", e);
                    self.disconnect();
                }
            }
        }
    }

    /// Drop the connection after an I/O failure. The failure counts toward
    /// the reconnect budget; only a successful read resets the counter, so
    /// a device that opens fine but dies on the first read still burns
    /// through the budget instead of cycling forever.
    fn disconnect(&mut self) {
        self.reader = None;
        self.buf.clear();
        self.consecutive_failures += 1;
        let _ = self.state_tx.send(ConnectionState::Reconnecting);
    }

    /// Retry opening the device until it succeeds or the budget runs out.
    /// Every attempt after a failure waits out the backoff delay first, so
    /// the reconnect cycle always yields to the runtime. Returns `false`
    /// on the transition to `Fatal`.
    async fn reopen(&mut self) -> bool {
        loop {
            if self.consecutive_failures >= self.max_failures {
                self.fatal = true;
                let _ = self.state_tx.send(ConnectionState::Fatal);
                error!("serial source exhausted its reconnect budget, giving up");
                return false;
            }
            if self.consecutive_failures > 0 {
                sleep(self.backoff_delay()).await;
            }
            match self.opener.open().await {
                Ok(port) => {
                    self.reader = Some(BufReader::new(port));
                    let _ = self.state_tx.send(ConnectionState::Connected);
                    info!("serial port opened");
                    return true;
                }
                Err(e) => {
                    self.consecutive_failures += 1;
                    warn!(
                        failures = self.consecutive_failures,
                        "failed to open serial port: {}", e
                    );
                    let _ = self.state_tx.send(ConnectionState::Reconnecting);
                }
            }
        }
    }

    /// Exponential backoff, doubling from the minimum up to the maximum
    fn backoff_delay(&self) -> Duration {
        let exp = self.consecutive_failures.saturating_sub(1).min(16);
        self.min_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }
}
