//! Serial Listener Library
//!
//! A serial port handle with a background receive listener. The owner opens a
//! device, configures the line, writes, and registers a handler; a dedicated
//! thread waits for incoming bytes and hands each completed read to that
//! handler.
//!
//! # Modules
//!
//! - `port`: The `SerialPort` handle, line-setting types and device backends
//! - `listener`: The receive listener thread and handler adapters
//! - `config`: Configuration management with TOML support
//! - `logging`: Tracing subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use serial_listener::{Handshake, SerialPort};
//!
//! let mut port = SerialPort::new();
//! port.register_listener(|data: &[u8]| print!("{}", String::from_utf8_lossy(data)));
//! port.open("/dev/ttyUSB0")?;
//! port.set_baud_rate(115200u32)?;
//! port.set_handshaking(Handshake::Hardware)?;
//! port.write(b"AT\r")?;
//! # Ok::<(), serial_listener::SerialError>(())
//! ```
//!
//! Tests and demos can swap the operating-system device for a mock:
//!
//! ```
//! use std::sync::Arc;
//! use serial_listener::port::{MockConnector, MockSerialDevice};
//! use serial_listener::SerialPort;
//!
//! let connector = MockConnector::new();
//! connector.add(MockSerialDevice::loopback("LOOP0"));
//!
//! let mut port = SerialPort::with_connector(Arc::new(connector));
//! port.open("LOOP0").unwrap();
//! assert_eq!(port.write(b"ping").unwrap(), 4);
//! port.close();
//! ```

pub mod config;
pub mod listener;
pub mod logging;
pub mod port;

// Re-export commonly used types for convenience
pub use listener::{
    receive_channel, ChannelHandler, ListenerOptions, ListenerState, ListenerStatus,
    ReceiveEvent, ReceiveHandler, StopSignal,
};
pub use port::{
    BaudRate, ByteSize, Handshake, HandshakeLines, LineControl, LineSettings, OsError, Parity,
    Result, SerialError, SerialPort, StopBits, Timeouts,
};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
