//! Port-specific error types.
//!
//! Every fallible operation on a port returns `SerialError`. Errors raised
//! inside the receive listener never cross the thread boundary as a return
//! value; they are recorded in the listener status and handed to the
//! registered handler instead.

use super::os_error::OsError;
use std::convert::Infallible;
use std::fmt;
use thiserror::Error;

/// Errors that can occur during serial port operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerialError {
    /// Opening the named device failed (missing, busy or not permitted).
    #[error("Serial device unavailable: {device}: {source}")]
    DeviceUnavailable {
        device: String,
        #[source]
        source: OsError,
    },

    /// A configuration value outside its legal set. No device state changed.
    #[error("Invalid {parameter}: {value}")]
    InvalidParameter {
        parameter: &'static str,
        value: String,
    },

    /// A configuration fetch/commit or an I/O call failed.
    #[error("Device error: {0}")]
    DeviceError(#[from] OsError),

    /// Attempted to use a port that's not open.
    #[error("Port is not open")]
    NotOpen,

    /// Attempted to open a port that's already open.
    #[error("Port is already open")]
    AlreadyOpen,

    /// A paced write stopped part way through.
    #[error("Write failed after {written} byte(s): {source}")]
    PartialWrite {
        written: usize,
        #[source]
        source: OsError,
    },

    /// The receive listener stopped because of a fatal error.
    #[error("Receive listener stopped: {0}")]
    Listener(OsError),
}

impl SerialError {
    /// Create an InvalidParameter error for a rejected value.
    pub fn invalid(parameter: &'static str, value: impl fmt::Display) -> Self {
        Self::InvalidParameter {
            parameter,
            value: value.to_string(),
        }
    }

    /// The underlying OS error, if this error carries one.
    pub fn os_error(&self) -> Option<&OsError> {
        match self {
            Self::DeviceUnavailable { source, .. } | Self::PartialWrite { source, .. } => {
                Some(source)
            }
            Self::DeviceError(source) | Self::Listener(source) => Some(source),
            Self::InvalidParameter { .. } | Self::NotOpen | Self::AlreadyOpen => None,
        }
    }
}

// Lets setters accept a typed value through the same `TryInto` bound as raw values.
impl From<Infallible> for SerialError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// Result type for port operations.
pub type Result<T> = std::result::Result<T, SerialError>;
