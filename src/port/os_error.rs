//! Operating-system error values.
//!
//! `OsError` pairs a stable numeric code with a human-readable description.
//! It is cheap to clone: the description is shared, so the same error can be
//! stored in listener status, handed to a handler and returned to a caller.

use std::fmt;
use std::io;
use std::sync::Arc;

/// An error reported by the operating system or a device driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsError {
    code: i32,
    description: Arc<str>,
}

impl OsError {
    /// Code used when neither the OS nor the driver reported one.
    pub const UNKNOWN: i32 = -1;
    /// The named device does not exist.
    pub const NO_DEVICE: i32 = -2;
    /// The driver rejected a parameter.
    pub const INVALID_INPUT: i32 = -3;
    /// An I/O failure without a raw OS code.
    pub const IO: i32 = -4;
    /// The backend cannot express the requested setting.
    pub const UNSUPPORTED: i32 = -5;

    /// Create an error from an explicit code and description.
    pub fn new(code: i32, description: impl Into<Arc<str>>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    /// Create an error from a raw OS error code, asking the platform for
    /// the matching message.
    pub fn from_code(code: i32) -> Self {
        let message = io::Error::from_raw_os_error(code).to_string();
        let suffix = format!(" (os error {code})");
        let description = message.strip_suffix(&suffix).unwrap_or(&message);
        Self::new(code, description)
    }

    /// Capture the calling thread's last OS error.
    pub fn last_os_error() -> Self {
        io::Error::last_os_error().into()
    }

    /// An error for a setting the backend has no way to apply.
    pub fn unsupported(what: impl fmt::Display) -> Self {
        Self::new(Self::UNSUPPORTED, format!("unsupported by this device: {what}"))
    }

    /// The numeric error code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// The human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Display for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.description, self.code)
    }
}

impl std::error::Error for OsError {}

impl From<io::Error> for OsError {
    fn from(err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(code) => Self::from_code(code),
            None => Self::new(Self::IO, err.to_string()),
        }
    }
}

impl From<serialport::Error> for OsError {
    fn from(err: serialport::Error) -> Self {
        let code = match err.kind() {
            serialport::ErrorKind::NoDevice => Self::NO_DEVICE,
            serialport::ErrorKind::InvalidInput => Self::INVALID_INPUT,
            serialport::ErrorKind::Io(_) => Self::IO,
            serialport::ErrorKind::Unknown => Self::UNKNOWN,
        };
        Self::new(code, err.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = OsError::new(31, "A device attached to the system is not functioning");
        assert_eq!(
            err.to_string(),
            "A device attached to the system is not functioning (code 31)"
        );
    }

    #[test]
    fn test_from_code_strips_os_suffix() {
        let err = OsError::from_code(2);
        assert_eq!(err.code(), 2);
        assert!(!err.description().contains("os error"));
        assert!(!err.description().is_empty());
    }

    #[test]
    fn test_io_error_without_raw_code() {
        let err: OsError = io::Error::new(io::ErrorKind::TimedOut, "timed out").into();
        assert_eq!(err.code(), OsError::IO);
        assert_eq!(err.description(), "timed out");
    }

    #[test]
    fn test_serialport_error_kinds() {
        let err: OsError = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone").into();
        assert_eq!(err.code(), OsError::NO_DEVICE);

        let err: OsError =
            serialport::Error::new(serialport::ErrorKind::InvalidInput, "bad baud").into();
        assert_eq!(err.code(), OsError::INVALID_INPUT);
        assert_eq!(err.description(), "bad baud");
    }

    #[test]
    fn test_clone_shares_description() {
        let err = OsError::unsupported("mark parity");
        let copy = err.clone();
        assert_eq!(err, copy);
        assert_eq!(copy.code(), OsError::UNSUPPORTED);
        assert!(copy.description().contains("mark parity"));
    }
}
