//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub push: PushConfig,
}

/// Serial source configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Upper bound on a single blocking read; an expired read is a no-op
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_reconnect_min_delay_ms")]
    pub reconnect_min_delay_ms: u64,

    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,

    /// Consecutive reconnect failures tolerated before going fatal
    #[serde(default = "default_max_reconnect_failures")]
    pub max_reconnect_failures: u32,
}

/// Broker and sink-buffer configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerConfig {
    /// Bound of each sink's sample queue unless overridden per sink
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Points kept per chart metric in the rolling-series sink
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
}

/// Mission-control push feed configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PushConfig {
    #[serde(default = "default_push_enabled")]
    pub enabled: bool,

    /// host:port of the telemetry bridge the feed connects out to
    #[serde(default = "default_push_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_retry_min_delay_ms")]
    pub retry_min_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    #[serde(default = "default_push_max_retries")]
    pub max_retries: u32,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_read_timeout_ms() -> u64 { 1000 }
fn default_reconnect_min_delay_ms() -> u64 { 500 }
fn default_reconnect_max_delay_ms() -> u64 { 10000 }
fn default_max_reconnect_failures() -> u32 { 10 }

fn default_queue_capacity() -> usize { 256 }
fn default_window_capacity() -> usize { 50 }

fn default_push_enabled() -> bool { true }
fn default_push_endpoint() -> String { "127.0.0.1:8080".to_string() }
fn default_retry_min_delay_ms() -> u64 { 250 }
fn default_retry_max_delay_ms() -> u64 { 5000 }
fn default_push_max_retries() -> u32 { 5 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            reconnect_min_delay_ms: default_reconnect_min_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            max_reconnect_failures: default_max_reconnect_failures(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            window_capacity: default_window_capacity(),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: default_push_enabled(),
            endpoint: default_push_endpoint(),
            retry_min_delay_ms: default_retry_min_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            max_retries: default_push_max_retries(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            broker: BrokerConfig::default(),
            push: PushConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(crate::error::HabetBrokerError::Config(
                toml::de::Error::custom("serial port cannot be empty")
            ));
        }

        if self.serial.read_timeout_ms == 0 || self.serial.read_timeout_ms > 10000 {
            return Err(crate::error::HabetBrokerError::Config(
                toml::de::Error::custom("read_timeout_ms must be between 1 and 10000")
            ));
        }

        if ![4800, 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600]
            .contains(&self.serial.baud_rate)
        {
            return Err(crate::error::HabetBrokerError::Config(
                toml::de::Error::custom("baud_rate must be a standard rate between 4800 and 921600")
            ));
        }

        if self.serial.reconnect_min_delay_ms == 0 {
            return Err(crate::error::HabetBrokerError::Config(
                toml::de::Error::custom("reconnect_min_delay_ms must be greater than 0")
            ));
        }

        if self.serial.reconnect_min_delay_ms > self.serial.reconnect_max_delay_ms {
            return Err(crate::error::HabetBrokerError::Config(
                toml::de::Error::custom("reconnect_min_delay_ms must not exceed reconnect_max_delay_ms")
            ));
        }

        if self.serial.max_reconnect_failures == 0 {
            return Err(crate::error::HabetBrokerError::Config(
                toml::de::Error::custom("max_reconnect_failures must be greater than 0")
            ));
        }

        if self.broker.queue_capacity == 0 {
            return Err(crate::error::HabetBrokerError::Config(
                toml::de::Error::custom("queue_capacity must be greater than 0")
            ));
        }

        if self.broker.window_capacity == 0 {
            return Err(crate::error::HabetBrokerError::Config(
                toml::de::Error::custom("window_capacity must be greater than 0")
            ));
        }

        if self.push.enabled {
            if self.push.endpoint.is_empty() {
                return Err(crate::error::HabetBrokerError::Config(
                    toml::de::Error::custom("push endpoint cannot be empty when enabled")
                ));
            }

            if self.push.retry_min_delay_ms == 0
                || self.push.retry_min_delay_ms > self.push.retry_max_delay_ms
            {
                return Err(crate::error::HabetBrokerError::Config(
                    toml::de::Error::custom("push retry delays must be non-zero and ordered")
                ));
            }

            if self.push.max_retries == 0 {
                return Err(crate::error::HabetBrokerError::Config(
                    toml::de::Error::custom("push max_retries must be greater than 0")
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_shipped_default_file_is_valid() {
        assert!(Config::load("config/default.toml").is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyACM1"
baud_rate = 57600

[broker]
queue_capacity = 32

[push]
enabled = false
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM1");
        assert_eq!(config.serial.baud_rate, 57600);
        assert_eq!(config.broker.queue_capacity, 32);
        assert!(!config.push.enabled);
        // Unspecified fields fall back to defaults
        assert_eq!(config.broker.window_capacity, 50);
        assert_eq!(config.serial.read_timeout_ms, 1000);
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = Config::default();
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_read_timeout_bounds() {
        let mut config = Config::default();
        config.serial.read_timeout_ms = 0;
        assert!(config.validate().is_err());
        config.serial.read_timeout_ms = 10001;
        assert!(config.validate().is_err());
        config.serial.read_timeout_ms = 1000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = Config::default();
        config.serial.baud_rate = 12345;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reconnect_delay_ordering() {
        let mut config = Config::default();
        config.serial.reconnect_min_delay_ms = 5000;
        config.serial.reconnect_max_delay_ms = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_reconnect_budget() {
        let mut config = Config::default();
        config.serial.max_reconnect_failures = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_capacities() {
        let mut config = Config::default();
        config.broker.queue_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.broker.window_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_push_validation_skipped_when_disabled() {
        let mut config = Config::default();
        config.push.enabled = false;
        config.push.endpoint = String::new();
        config.push.max_retries = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_push_endpoint_when_enabled() {
        let mut config = Config::default();
        config.push.endpoint = String::new();
        assert!(config.validate().is_err());
    }
}
