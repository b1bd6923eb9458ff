//! Line parameters and the device traits behind a port.
//!
//! `LineSettings` is the full set of line parameters committed to a device as
//! one unit. `SerialDevice` abstracts the device itself so real hardware and
//! the mock device can be used interchangeably.

use super::error::SerialError;
use super::os_error::OsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Supported baud rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum BaudRate {
    B110,
    B300,
    B600,
    B1200,
    B2400,
    B4800,
    B9600,
    B14400,
    B19200,
    B38400,
    B56000,
    B57600,
    B115200,
    B128000,
    B256000,
}

impl BaudRate {
    /// Every supported rate, slowest first.
    pub const ALL: [BaudRate; 15] = [
        BaudRate::B110,
        BaudRate::B300,
        BaudRate::B600,
        BaudRate::B1200,
        BaudRate::B2400,
        BaudRate::B4800,
        BaudRate::B9600,
        BaudRate::B14400,
        BaudRate::B19200,
        BaudRate::B38400,
        BaudRate::B56000,
        BaudRate::B57600,
        BaudRate::B115200,
        BaudRate::B128000,
        BaudRate::B256000,
    ];

    /// The rate in bits per second.
    pub const fn bits_per_second(self) -> u32 {
        match self {
            BaudRate::B110 => 110,
            BaudRate::B300 => 300,
            BaudRate::B600 => 600,
            BaudRate::B1200 => 1200,
            BaudRate::B2400 => 2400,
            BaudRate::B4800 => 4800,
            BaudRate::B9600 => 9600,
            BaudRate::B14400 => 14400,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
            BaudRate::B56000 => 56000,
            BaudRate::B57600 => 57600,
            BaudRate::B115200 => 115200,
            BaudRate::B128000 => 128000,
            BaudRate::B256000 => 256000,
        }
    }
}

impl From<BaudRate> for u32 {
    fn from(baud: BaudRate) -> Self {
        baud.bits_per_second()
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = SerialError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|baud| baud.bits_per_second() == value)
            .ok_or_else(|| SerialError::invalid("baud rate", value))
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits_per_second())
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub enum StopBits {
    One,
    OnePointFive,
    Two,
}

impl StopBits {
    pub const ALL: [StopBits; 3] = [StopBits::One, StopBits::OnePointFive, StopBits::Two];

    pub fn as_f32(self) -> f32 {
        match self {
            StopBits::One => 1.0,
            StopBits::OnePointFive => 1.5,
            StopBits::Two => 2.0,
        }
    }
}

impl From<StopBits> for f32 {
    fn from(bits: StopBits) -> Self {
        bits.as_f32()
    }
}

impl TryFrom<f32> for StopBits {
    type Error = SerialError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|bits| bits.as_f32() == value)
            .ok_or_else(|| SerialError::invalid("stop bits", value))
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_f32())
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ByteSize {
    Five,
    Six,
    Seven,
    Eight,
}

impl ByteSize {
    pub const ALL: [ByteSize; 4] = [
        ByteSize::Five,
        ByteSize::Six,
        ByteSize::Seven,
        ByteSize::Eight,
    ];

    pub const fn bits(self) -> u8 {
        match self {
            ByteSize::Five => 5,
            ByteSize::Six => 6,
            ByteSize::Seven => 7,
            ByteSize::Eight => 8,
        }
    }
}

impl From<ByteSize> for u8 {
    fn from(size: ByteSize) -> Self {
        size.bits()
    }
}

impl TryFrom<u8> for ByteSize {
    type Error = SerialError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(ByteSize::Five),
            6 => Ok(ByteSize::Six),
            7 => Ok(ByteSize::Seven),
            8 => Ok(ByteSize::Eight),
            other => Err(SerialError::invalid("byte size", other)),
        }
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// Parity checking modes.
///
/// The raw `u8` form uses the conventional codes: none 0, odd 1, even 2,
/// mark 3, space 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl Parity {
    pub const ALL: [Parity; 5] = [
        Parity::None,
        Parity::Odd,
        Parity::Even,
        Parity::Mark,
        Parity::Space,
    ];

    pub const fn code(self) -> u8 {
        match self {
            Parity::None => 0,
            Parity::Odd => 1,
            Parity::Even => 2,
            Parity::Mark => 3,
            Parity::Space => 4,
        }
    }
}

impl TryFrom<u8> for Parity {
    type Error = SerialError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| SerialError::invalid("parity", value))
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Parity::None => "none",
            Parity::Odd => "odd",
            Parity::Even => "even",
            Parity::Mark => "mark",
            Parity::Space => "space",
        };
        f.write_str(name)
    }
}

/// Flow-control profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handshake {
    /// No handshaking.
    #[default]
    Off,
    /// RTS/CTS with DTR/DSR handshaking.
    Hardware,
    /// XON/XOFF.
    Software,
}

impl Handshake {
    pub const ALL: [Handshake; 3] = [Handshake::Off, Handshake::Hardware, Handshake::Software];

    /// The six flow-control lines this profile sets.
    pub const fn lines(self) -> HandshakeLines {
        match self {
            Handshake::Off => HandshakeLines {
                cts_flow: false,
                dsr_flow: false,
                dtr_control: LineControl::Disable,
                rts_control: LineControl::Disable,
                xon_xoff_out: false,
                xon_xoff_in: false,
            },
            Handshake::Hardware => HandshakeLines {
                cts_flow: true,
                dsr_flow: true,
                dtr_control: LineControl::Handshake,
                rts_control: LineControl::Handshake,
                xon_xoff_out: false,
                xon_xoff_in: false,
            },
            Handshake::Software => HandshakeLines {
                cts_flow: false,
                dsr_flow: false,
                dtr_control: LineControl::Disable,
                rts_control: LineControl::Disable,
                xon_xoff_out: true,
                xon_xoff_in: true,
            },
        }
    }
}

impl TryFrom<u8> for Handshake {
    type Error = SerialError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| SerialError::invalid("handshake", value))
    }
}

/// How a modem-control output line (DTR or RTS) is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineControl {
    Disable,
    Enable,
    Handshake,
}

/// The flow-control fields of the line settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandshakeLines {
    /// Monitor CTS before sending.
    pub cts_flow: bool,
    /// Monitor DSR before sending.
    pub dsr_flow: bool,
    pub dtr_control: LineControl,
    pub rts_control: LineControl,
    /// XON/XOFF while transmitting.
    pub xon_xoff_out: bool,
    /// XON/XOFF while receiving.
    pub xon_xoff_in: bool,
}

impl HandshakeLines {
    /// The profile these lines match, if any.
    pub fn profile(&self) -> Option<Handshake> {
        Handshake::ALL
            .iter()
            .copied()
            .find(|mode| mode.lines() == *self)
    }
}

impl Default for HandshakeLines {
    fn default() -> Self {
        Handshake::Off.lines()
    }
}

/// Line parameters committed to the device as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSettings {
    pub baud_rate: BaudRate,
    pub stop_bits: StopBits,
    pub byte_size: ByteSize,
    pub parity: Parity,
    pub handshake: HandshakeLines,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self {
            baud_rate: BaudRate::B9600,
            stop_bits: StopBits::One,
            byte_size: ByteSize::Eight,
            parity: Parity::None,
            handshake: HandshakeLines::default(),
        }
    }
}

/// Read and write timeout policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Longest gap between bytes before a read returns. `None` returns
    /// immediately with whatever is already buffered.
    pub read_interval: Option<Duration>,
    /// Upper bound on a single read.
    pub read_total: Duration,
    /// Upper bound on a single write. `None` means no timeout.
    pub write_total: Option<Duration>,
}

impl Default for Timeouts {
    /// Reads return as soon as any data is available; writes never time out.
    fn default() -> Self {
        Self {
            read_interval: None,
            read_total: Duration::from_millis(1),
            write_total: None,
        }
    }
}

/// Outcome of one bounded wait for incoming data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The device signalled that data has arrived.
    DataReady,
    /// Nothing arrived before the wait expired; try again.
    Pending,
}

/// An open serial device.
///
/// Implementations own the OS resource; dropping the device releases it.
pub trait SerialDevice: Send + fmt::Debug {
    /// Get the name/path of this device.
    fn name(&self) -> &str;

    /// Fetch the full line settings currently applied to the device.
    fn read_settings(&self) -> Result<LineSettings, OsError>;

    /// Commit a full set of line settings.
    fn write_settings(&mut self, settings: &LineSettings) -> Result<(), OsError>;

    /// Install a timeout policy.
    fn set_timeouts(&mut self, timeouts: &Timeouts) -> Result<(), OsError>;

    /// Write bytes, blocking until the device accepts them.
    ///
    /// Returns the number of bytes actually written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, OsError>;

    /// Read whatever is available into `buffer`.
    ///
    /// Returns the number of bytes actually read, which may be zero.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, OsError>;

    /// Create the readiness source the receive listener waits on.
    ///
    /// The source is independent of the device lock so waiting never blocks
    /// writers.
    fn event_source(&mut self) -> Result<Box<dyn RxEventSource>, OsError>;
}

/// Notifies the receive listener that data has arrived.
pub trait RxEventSource: Send {
    /// Ask the device to signal received-data events.
    fn arm(&mut self) -> Result<(), OsError>;

    /// Block until data arrives or `timeout` elapses.
    fn wait(&mut self, timeout: Duration) -> Result<WaitOutcome, OsError>;
}

/// Opens devices by identifier.
pub trait DeviceConnector: Send + Sync + fmt::Debug {
    /// Acquire exclusive ownership of the named device.
    fn connect(&self, device: &str) -> Result<Box<dyn SerialDevice>, OsError>;
}
