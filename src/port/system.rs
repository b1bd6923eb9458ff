//! Serial devices backed by the operating system.
//!
//! Wraps the `serialport` crate behind the `SerialDevice` trait. On Unix the
//! receive listener waits with `poll(2)` on a cloned descriptor; elsewhere it
//! polls the driver's input queue on a cloned handle.

use super::os_error::OsError;
use super::traits::{
    BaudRate, ByteSize, DeviceConnector, Handshake, LineSettings, Parity, RxEventSource,
    SerialDevice, StopBits, Timeouts, WaitOutcome,
};
use serialport::SerialPort as _;
use std::io::{Read, Write};
use std::time::Duration;

#[cfg(unix)]
type NativePort = serialport::TTYPort;

#[cfg(not(unix))]
type NativePort = Box<dyn serialport::SerialPort>;

/// `serialport` has a single timeout for reads and writes. Reads only run
/// once the listener has seen data, so the timeout is sized for writes.
const UNBOUNDED_WRITE_TIMEOUT: Duration = Duration::from_secs(3600);

/// Opens devices through the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemConnector;

impl DeviceConnector for SystemConnector {
    fn connect(&self, device: &str) -> Result<Box<dyn SerialDevice>, OsError> {
        Ok(Box::new(SystemSerialDevice::open(device)?))
    }
}

/// A serial device opened through the operating system.
pub struct SystemSerialDevice {
    port: NativePort,
    name: String,
}

impl SystemSerialDevice {
    /// Open a serial device by its system path (e.g. "/dev/ttyUSB0" or "COM3").
    ///
    /// The device starts at 9600 baud; callers apply the rest of the line
    /// settings afterwards.
    ///
    /// # Example
    /// ```no_run
    /// use serial_listener::port::SystemSerialDevice;
    ///
    /// let device = SystemSerialDevice::open("/dev/ttyUSB0")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(device: &str) -> Result<Self, OsError> {
        let builder = serialport::new(device, BaudRate::B9600.bits_per_second())
            .timeout(UNBOUNDED_WRITE_TIMEOUT);
        let port = open_native(builder)?;

        Ok(Self {
            port,
            name: device.to_string(),
        })
    }
}

#[cfg(unix)]
fn open_native(builder: serialport::SerialPortBuilder) -> serialport::Result<NativePort> {
    builder.open_native()
}

#[cfg(not(unix))]
fn open_native(builder: serialport::SerialPortBuilder) -> serialport::Result<NativePort> {
    builder.open()
}

impl SerialDevice for SystemSerialDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_settings(&self) -> Result<LineSettings, OsError> {
        let baud = self.port.baud_rate()?;
        let baud_rate = BaudRate::try_from(baud)
            .map_err(|_| OsError::unsupported(format!("driver reports {baud} baud")))?;

        let byte_size = match self.port.data_bits()? {
            serialport::DataBits::Five => ByteSize::Five,
            serialport::DataBits::Six => ByteSize::Six,
            serialport::DataBits::Seven => ByteSize::Seven,
            serialport::DataBits::Eight => ByteSize::Eight,
        };
        let parity = match self.port.parity()? {
            serialport::Parity::None => Parity::None,
            serialport::Parity::Odd => Parity::Odd,
            serialport::Parity::Even => Parity::Even,
        };
        let stop_bits = match self.port.stop_bits()? {
            serialport::StopBits::One => StopBits::One,
            serialport::StopBits::Two => StopBits::Two,
        };
        let handshake = match self.port.flow_control()? {
            serialport::FlowControl::None => Handshake::Off,
            serialport::FlowControl::Software => Handshake::Software,
            serialport::FlowControl::Hardware => Handshake::Hardware,
        };

        Ok(LineSettings {
            baud_rate,
            stop_bits,
            byte_size,
            parity,
            handshake: handshake.lines(),
        })
    }

    fn write_settings(&mut self, settings: &LineSettings) -> Result<(), OsError> {
        let parity = match settings.parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
            other => return Err(OsError::unsupported(format!("{other} parity"))),
        };
        let stop_bits = match settings.stop_bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
            other => return Err(OsError::unsupported(format!("{other} stop bits"))),
        };
        let data_bits = match settings.byte_size {
            ByteSize::Five => serialport::DataBits::Five,
            ByteSize::Six => serialport::DataBits::Six,
            ByteSize::Seven => serialport::DataBits::Seven,
            ByteSize::Eight => serialport::DataBits::Eight,
        };
        let flow_control = match settings.handshake.profile() {
            Some(Handshake::Off) => serialport::FlowControl::None,
            Some(Handshake::Software) => serialport::FlowControl::Software,
            Some(Handshake::Hardware) => serialport::FlowControl::Hardware,
            None => return Err(OsError::unsupported("custom handshake lines")),
        };

        self.port.set_baud_rate(settings.baud_rate.bits_per_second())?;
        self.port.set_data_bits(data_bits)?;
        self.port.set_parity(parity)?;
        self.port.set_stop_bits(stop_bits)?;
        self.port.set_flow_control(flow_control)?;
        Ok(())
    }

    fn set_timeouts(&mut self, timeouts: &Timeouts) -> Result<(), OsError> {
        let timeout = timeouts.write_total.unwrap_or(UNBOUNDED_WRITE_TIMEOUT);
        self.port.set_timeout(timeout)?;
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, OsError> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, OsError> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    #[cfg(unix)]
    fn event_source(&mut self) -> Result<Box<dyn RxEventSource>, OsError> {
        let peer = self.port.try_clone_native()?;
        Ok(Box::new(PollEventSource { peer }))
    }

    #[cfg(not(unix))]
    fn event_source(&mut self) -> Result<Box<dyn RxEventSource>, OsError> {
        let peer = self.port.try_clone()?;
        Ok(Box::new(QueuePollEventSource { peer }))
    }
}

impl std::fmt::Debug for SystemSerialDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemSerialDevice")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate().ok())
            .finish()
    }
}

/// Waits for input with `poll(2)` on a cloned descriptor.
#[cfg(unix)]
struct PollEventSource {
    peer: serialport::TTYPort,
}

#[cfg(unix)]
impl RxEventSource for PollEventSource {
    fn arm(&mut self) -> Result<(), OsError> {
        // A descriptor the driver no longer accepts fails here rather than
        // on the first wait.
        self.peer.bytes_to_read()?;
        Ok(())
    }

    fn wait(&mut self, timeout: Duration) -> Result<WaitOutcome, OsError> {
        use std::os::unix::io::AsRawFd;

        let mut fds = libc::pollfd {
            fd: self.peer.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        // SAFETY: `fds` is a single valid pollfd that outlives the call.
        let ready = unsafe { libc::poll(&mut fds, 1, millis) };
        match ready {
            -1 => {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    Ok(WaitOutcome::Pending)
                } else {
                    Err(err.into())
                }
            }
            0 => Ok(WaitOutcome::Pending),
            _ if fds.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 => Err(
                OsError::new(OsError::IO, "serial device reported hang-up or error"),
            ),
            _ => Ok(WaitOutcome::DataReady),
        }
    }
}

/// Waits for input by probing the driver's input queue on a cloned handle.
#[cfg(not(unix))]
struct QueuePollEventSource {
    peer: Box<dyn serialport::SerialPort>,
}

#[cfg(not(unix))]
impl RxEventSource for QueuePollEventSource {
    fn arm(&mut self) -> Result<(), OsError> {
        self.peer.bytes_to_read()?;
        Ok(())
    }

    fn wait(&mut self, timeout: Duration) -> Result<WaitOutcome, OsError> {
        const POLL_STEP: Duration = Duration::from_millis(1);

        let deadline = std::time::Instant::now() + timeout;
        loop {
            if self.peer.bytes_to_read()? > 0 {
                return Ok(WaitOutcome::DataReady);
            }
            if std::time::Instant::now() >= deadline {
                return Ok(WaitOutcome::Pending);
            }
            std::thread::sleep(POLL_STEP);
        }
    }
}
