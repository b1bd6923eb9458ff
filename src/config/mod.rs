//! Configuration module for serial_listener.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_LISTENER_CONFIG` environment variable (explicit path)
//! 2. `./serial-listener.toml` (current directory)
//! 3. `~/.config/serial-listener/config.toml` (XDG on Linux)
//! 4. `%APPDATA%\serial-listener\config.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `SERIAL_LISTENER_<SECTION>_<KEY>`:
//!
//! - `SERIAL_LISTENER_SERIAL_DEVICE=/dev/ttyUSB0`
//! - `SERIAL_LISTENER_SERIAL_BAUD_RATE=19200`
//! - `SERIAL_LISTENER_SERIAL_PARITY=odd`
//! - `SERIAL_LISTENER_LISTENER_BUFFER_SIZE=4096`
//! - `SERIAL_LISTENER_WRITE_INTER_BYTE_DELAY_MS=5`
//! - `SERIAL_LISTENER_LOGGING_FORMAT=json`
//!
//! # Example
//!
//! ```no_run
//! use serial_listener::config::ConfigLoader;
//! use serial_listener::SerialPort;
//!
//! let config = ConfigLoader::load()?.into_config();
//! let mut port = SerialPort::new();
//! port.open_with_config(&config)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{
    Config, LineConfig, ListenerConfig, LogFormat, LoggingConfig, SerialConfig, WriteConfig,
    MAX_BUFFER_SIZE,
};
