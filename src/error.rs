//! # Error Types
//!
//! Custom error types for the HABET broker using `thiserror`.

use thiserror::Error;

/// Main error type for the HABET broker
#[derive(Debug, Error)]
pub enum HabetBrokerError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// The serial source exceeded its reconnect budget and stopped
    #[error("telemetry source exhausted its reconnect budget")]
    SourceExhausted,

    /// A pipeline task panicked or was cancelled
    #[error("pipeline task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the HABET broker
pub type Result<T> = std::result::Result<T, HabetBrokerError>;
