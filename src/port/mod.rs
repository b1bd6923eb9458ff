//! Port abstraction layer for serial communication.
//!
//! `SerialPort` is the handle applications use. Underneath, the
//! `SerialDevice` trait lets real hardware and the mock device be swapped,
//! which is how the tests run without a serial adapter.

pub mod error;
pub mod handle;
pub mod mock;
pub mod os_error;
pub mod system;
pub mod traits;

pub use error::{Result, SerialError};
pub use handle::SerialPort;
pub use mock::{MockConnector, MockFaults, MockSerialDevice, INJECTED_FAULT_CODE};
pub use os_error::OsError;
pub use system::{SystemConnector, SystemSerialDevice};
pub use traits::*;
