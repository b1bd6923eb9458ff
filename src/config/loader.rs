//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use crate::port::BaudRate;
use directories::BaseDirs;
use serde::de::{value::StrDeserializer, DeserializeOwned, IntoDeserializer};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_LISTENER";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_LISTENER_CONFIG";

/// Config file name in the working directory
const LOCAL_CONFIG_FILE: &str = "serial-listener.toml";

/// Config file name inside the application config directory
const CONFIG_FILE_NAME: &str = "config.toml";

const APP_DIR: &str = "serial-listener";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL_LISTENER_CONFIG` environment variable (explicit path)
    /// 2. `./serial-listener.toml` (current directory)
    /// 3. `serial-listener/config.toml` in the platform config directory
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values, and the result is
    /// validated.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };
        apply_env_overrides(&mut config)?;
        config.validate()?;

        debug!(path = ?config_path, "Configuration loaded");
        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    ///
    /// Environment overrides that fail to parse or validate are ignored.
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        let mut overridden = config.clone();
        if apply_env_overrides(&mut overridden).is_ok() && overridden.validate().is_ok() {
            config = overridden;
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to the file it was loaded from.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self
            .config_path
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("No config file path set".to_string()))?;

        save_to_file(&self.config, path)
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }

    /// Reload configuration from file (if path is set).
    ///
    /// On failure the previous configuration is kept.
    pub fn reload(&mut self) -> ConfigResult<()> {
        if let Some(ref path) = self.config_path {
            let mut config = load_from_file(path)?;
            apply_env_overrides(&mut config)?;
            config.validate()?;
            self.config = config;
        }
        Ok(())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }

    get_default_config_path().filter(|path| path.exists())
}

/// Get the default config directory for creating new config files.
///
/// `$XDG_CONFIG_HOME` or `~/.config` on Linux, `%APPDATA%` on Windows.
pub fn get_default_config_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.config_dir().join(APP_DIR))
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn env_var(key: &str) -> Option<(String, String)> {
    let var = format!("{ENV_PREFIX}_{key}");
    std::env::var(&var).ok().map(|value| (var, value))
}

fn parse_number<T>(key: &str) -> ConfigResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_var(key)
        .map(|(var, value)| {
            value
                .trim()
                .parse()
                .map_err(|e| ConfigError::env_override(var, &value, e))
        })
        .transpose()
}

/// Parse a unit enum by its configuration-file name ("odd", "hardware").
fn parse_named<T: DeserializeOwned>(key: &str) -> ConfigResult<Option<T>> {
    env_var(key)
        .map(|(var, value)| {
            let lowered = value.trim().to_ascii_lowercase();
            let de: StrDeserializer<'_, serde::de::value::Error> =
                lowered.as_str().into_deserializer();
            T::deserialize(de).map_err(|e| ConfigError::env_override(var, &value, e))
        })
        .transpose()
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern `SERIAL_LISTENER_<SECTION>_<KEY>`,
/// for example:
/// - `SERIAL_LISTENER_SERIAL_DEVICE=/dev/ttyUSB0`
/// - `SERIAL_LISTENER_SERIAL_BAUD_RATE=19200`
/// - `SERIAL_LISTENER_LISTENER_BUFFER_SIZE=4096`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Serial overrides
    if let Some((_, device)) = env_var("SERIAL_DEVICE") {
        config.serial.device = Some(device);
    }
    if let Some((var, value)) = env_var("SERIAL_BAUD_RATE") {
        let raw: u32 = value
            .trim()
            .parse()
            .map_err(|e| ConfigError::env_override(var.clone(), &value, e))?;
        config.serial.line.baud_rate =
            BaudRate::try_from(raw).map_err(|e| ConfigError::env_override(var, &value, e))?;
    }
    if let Some(stop_bits) = parse_number::<f32>("SERIAL_STOP_BITS")? {
        let var = format!("{ENV_PREFIX}_SERIAL_STOP_BITS");
        config.serial.line.stop_bits = stop_bits
            .try_into()
            .map_err(|e| ConfigError::env_override(var, &stop_bits.to_string(), e))?;
    }
    if let Some(byte_size) = parse_number::<u8>("SERIAL_BYTE_SIZE")? {
        let var = format!("{ENV_PREFIX}_SERIAL_BYTE_SIZE");
        config.serial.line.byte_size = byte_size
            .try_into()
            .map_err(|e| ConfigError::env_override(var, &byte_size.to_string(), e))?;
    }
    if let Some(parity) = parse_named("SERIAL_PARITY")? {
        config.serial.line.parity = parity;
    }
    if let Some(handshake) = parse_named("SERIAL_HANDSHAKE")? {
        config.serial.line.handshake = handshake;
    }

    // Listener overrides
    if let Some(size) = parse_number("LISTENER_BUFFER_SIZE")? {
        config.listener.buffer_size = size;
    }
    if let Some(ms) = parse_number("LISTENER_POLL_INTERVAL_MS")? {
        config.listener.poll_interval_ms = ms;
    }

    // Write overrides
    if let Some(ms) = parse_number("WRITE_INTER_BYTE_DELAY_MS")? {
        config.write.inter_byte_delay_ms = ms;
    }

    // Logging overrides
    if let Some((_, level)) = env_var("LOGGING_LEVEL") {
        config.logging.level = level;
    }
    if let Some((var, value)) = env_var("LOGGING_FORMAT") {
        config.logging.format = value
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::env_override(var, &value, e))?;
    }

    Ok(())
}
