//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
pub use crate::listener::MAX_BUFFER_SIZE;
use crate::listener::{ListenerOptions, DEFAULT_BUFFER_SIZE, DEFAULT_POLL_INTERVAL};
use crate::port::{BaudRate, ByteSize, Handshake, LineSettings, Parity, StopBits};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial device configuration
    pub serial: SerialConfig,
    /// Receive listener configuration
    pub listener: ListenerConfig,
    /// Write configuration
    pub write: WriteConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Check values that the type system does not.
    pub fn validate(&self) -> ConfigResult<()> {
        self.listener.validate()?;
        if matches!(self.serial.device.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(ConfigError::validation("serial.device", "must not be empty"));
        }
        Ok(())
    }
}

/// Serial device configuration section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device to open (path or alias)
    pub device: Option<String>,
    /// Device aliases for convenience
    pub aliases: HashMap<String, String>,
    /// Line settings applied after the open-time defaults
    pub line: LineConfig,
}

impl SerialConfig {
    /// Resolve a device name through aliases
    pub fn resolve_device(&self, name: &str) -> String {
        self.aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

/// Line settings as written in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    pub baud_rate: BaudRate,
    pub stop_bits: StopBits,
    pub byte_size: ByteSize,
    pub parity: Parity,
    pub handshake: Handshake,
}

impl Default for LineConfig {
    fn default() -> Self {
        let settings = LineSettings::default();
        Self {
            baud_rate: settings.baud_rate,
            stop_bits: settings.stop_bits,
            byte_size: settings.byte_size,
            parity: settings.parity,
            handshake: Handshake::Off,
        }
    }
}

impl LineConfig {
    pub fn to_settings(&self) -> LineSettings {
        LineSettings {
            baud_rate: self.baud_rate,
            stop_bits: self.stop_bits,
            byte_size: self.byte_size,
            parity: self.parity,
            handshake: self.handshake.lines(),
        }
    }
}

/// Receive listener configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Receive buffer capacity in bytes
    pub buffer_size: usize,
    /// Bound on a single wait in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl ListenerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn options(&self) -> ListenerOptions {
        ListenerOptions {
            buffer_size: self.buffer_size,
            poll_interval: self.poll_interval(),
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        if !(1..=MAX_BUFFER_SIZE).contains(&self.buffer_size) {
            return Err(ConfigError::validation(
                "listener.buffer_size",
                format!("must be between 1 and {MAX_BUFFER_SIZE}"),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::validation(
                "listener.poll_interval_ms",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Write configuration section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteConfig {
    /// Delay between bytes for paced writes, in milliseconds
    pub inter_byte_delay_ms: u64,
}

impl WriteConfig {
    pub fn inter_byte_delay(&self) -> Duration {
        Duration::from_millis(self.inter_byte_delay_ms)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(ConfigError::validation(
                "logging.format",
                format!("unknown format '{other}'"),
            )),
        }
    }
}
