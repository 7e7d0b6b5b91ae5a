//! Trait abstraction for opening the serial port to enable testing

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio_serial::SerialPortBuilderExt;
use tracing::debug;

use crate::error::{HabetBrokerError, Result};

/// Boxed readable stream handed back by a [`PortOpener`]
pub type PortReader = Box<dyn AsyncRead + Send + Unpin>;

/// Trait for opening the telemetry input device.
///
/// [`SerialSource`](super::SerialSource) goes through this seam for every
/// (re)connect, so reconnect and backoff behavior is testable against
/// in-memory streams.
#[async_trait]
pub trait PortOpener: Send + Sync {
    /// Open the device and return its readable half
    async fn open(&self) -> Result<PortReader>;
}

/// Production opener backed by `tokio_serial`
pub struct TtyOpener {
    path: String,
    baud_rate: u32,
}

impl TtyOpener {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
        }
    }
}

#[async_trait]
impl PortOpener for TtyOpener {
    async fn open(&self) -> Result<PortReader> {
        debug!("Trying to open serial port: {}", self.path);

        let port = tokio_serial::new(&self.path, self.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                HabetBrokerError::Serial(format!("Failed to open {}: {}", self.path, e))
            })?;

        Ok(Box::new(port))
    }
}
