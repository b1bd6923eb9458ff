//! The port handle.
//!
//! `SerialPort` owns one device at a time together with its receive
//! listener. Every setter runs fetch-mutate-commit on the full
//! `LineSettings` while holding the device lock, so it never interleaves
//! with a write or with the listener's read.

use super::error::{Result, SerialError};
use super::system::SystemConnector;
use super::traits::{
    BaudRate, ByteSize, DeviceConnector, Handshake, LineSettings, Parity, StopBits, Timeouts,
};
use crate::config::Config;
use crate::listener::{
    ListenerOptions, ListenerStatus, ReceiveHandler, ReceiveListener, SharedDevice, SharedHandler,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A device that is currently open.
struct OpenPort {
    name: String,
    device: SharedDevice,
    listener: ReceiveListener,
}

/// A single serial port with a background receive listener.
///
/// # Example
/// ```no_run
/// use serial_listener::{Parity, SerialPort};
///
/// let mut port = SerialPort::new();
/// port.register_listener(|data: &[u8]| println!("received {} byte(s)", data.len()));
/// port.open("/dev/ttyUSB0")?;
/// port.set_baud_rate(19200u32)?;
/// port.set_parity(Parity::Odd)?;
/// port.write(b"ABC")?;
/// port.close();
/// # Ok::<(), serial_listener::SerialError>(())
/// ```
pub struct SerialPort {
    connector: Arc<dyn DeviceConnector>,
    handler: SharedHandler,
    options: ListenerOptions,
    inter_byte_delay: Duration,
    open: Option<OpenPort>,
}

impl SerialPort {
    /// Create a closed port that opens operating-system devices.
    pub fn new() -> Self {
        Self::with_connector(Arc::new(SystemConnector))
    }

    /// Create a closed port that opens devices through `connector`.
    pub fn with_connector(connector: Arc<dyn DeviceConnector>) -> Self {
        Self {
            connector,
            handler: Arc::new(Mutex::new(None)),
            options: ListenerOptions::default(),
            inter_byte_delay: Duration::ZERO,
            open: None,
        }
    }

    /// Use `options` for listeners started by later opens.
    ///
    /// The options are checked by `open`.
    pub fn with_listener_options(mut self, options: ListenerOptions) -> Self {
        self.options = options;
        self
    }

    /// Delay between bytes used by `write_configured`. Zero disables pacing.
    pub fn set_inter_byte_delay(&mut self, delay: Duration) {
        self.inter_byte_delay = delay;
    }

    pub fn inter_byte_delay(&self) -> Duration {
        self.inter_byte_delay
    }

    /// Open the device named by `device`.
    ///
    /// Applies 9600 baud, one stop bit, 8-bit bytes, no parity, no
    /// handshaking and the default timeouts, in that order, then starts the
    /// receive listener. If any default cannot be applied the device is
    /// released and the error returned. Invalid listener options fail with
    /// `InvalidParameter` before the device is touched.
    pub fn open(&mut self, device: &str) -> Result<()> {
        if self.open.is_some() {
            return Err(SerialError::AlreadyOpen);
        }
        self.options.validate()?;

        let raw = self
            .connector
            .connect(device)
            .map_err(|source| SerialError::DeviceUnavailable {
                device: device.to_string(),
                source,
            })?;
        let shared: SharedDevice = Arc::new(Mutex::new(raw));

        if let Err(err) = apply_defaults(&shared) {
            warn!(device, error = %err, "Failed to apply default line settings; closing");
            return Err(err);
        }

        let listener = ReceiveListener::spawn(
            Arc::clone(&shared),
            Arc::clone(&self.handler),
            self.options,
        )?;

        self.open = Some(OpenPort {
            name: device.to_string(),
            device: shared,
            listener,
        });
        info!(device, "Serial port opened");
        Ok(())
    }

    /// Open the device named in `config`, then apply its line settings.
    ///
    /// The config is validated first. Its listener options and inter-byte
    /// delay replace the current ones.
    pub fn open_with_config(&mut self, config: &Config) -> Result<()> {
        config
            .validate()
            .map_err(|err| SerialError::invalid("config", err))?;
        let device = config
            .serial
            .device
            .as_deref()
            .map(|name| config.serial.resolve_device(name))
            .ok_or_else(|| SerialError::invalid("device", "<not configured>"))?;

        self.options = config.listener.options();
        self.inter_byte_delay = config.write.inter_byte_delay();
        self.open(&device)?;

        if let Err(err) = self.apply_settings(&config.serial.line.to_settings()) {
            self.close();
            return Err(err);
        }
        Ok(())
    }

    /// Whether a device is currently held.
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Name of the open device.
    pub fn device_name(&self) -> Option<&str> {
        self.open.as_ref().map(|open| open.name.as_str())
    }

    /// Stop the listener, then release the device.
    ///
    /// Closing a closed port does nothing.
    pub fn close(&mut self) {
        let Some(open) = self.open.take() else {
            return;
        };

        let status = open.listener.shutdown();
        if let Some(err) = &status.error {
            debug!(device = %open.name, error = %err, "Listener had already stopped");
        }
        drop(open.device);
        info!(
            device = %open.name,
            bytes_received = status.bytes_received,
            "Serial port closed"
        );
    }

    /// Install the handler that receives incoming data, replacing any other.
    pub fn register_listener<H>(&self, handler: H)
    where
        H: ReceiveHandler + 'static,
    {
        let mut handler: Box<dyn ReceiveHandler> = Box::new(handler);
        if let Some(open) = &self.open {
            handler.attach(open.listener.stop_signal());
        }
        *self.handler.lock() = Some(handler);
    }

    /// Remove the handler; received data is read and discarded.
    pub fn clear_listener(&self) {
        *self.handler.lock() = None;
    }

    /// State of the current listener, if the port is open.
    pub fn listener_status(&self) -> Option<ListenerStatus> {
        self.open.as_ref().map(|open| open.listener.status())
    }

    /// Read back the line settings from the device.
    pub fn settings(&self) -> Result<LineSettings> {
        let device = self.device()?;
        let settings = device.lock().read_settings()?;
        Ok(settings)
    }

    /// Set the baud rate.
    ///
    /// Accepts a `BaudRate` or a raw `u32`; raw values outside the supported
    /// set fail with `InvalidParameter` before the device is touched.
    pub fn set_baud_rate<B>(&self, baud_rate: B) -> Result<()>
    where
        B: TryInto<BaudRate>,
        SerialError: From<B::Error>,
    {
        let baud_rate = baud_rate.try_into()?;
        update_settings(self.device()?, |s| s.baud_rate = baud_rate)?;
        debug!(%baud_rate, "Baud rate set");
        Ok(())
    }

    /// Set the number of stop bits (`StopBits` or raw 1.0, 1.5, 2.0).
    pub fn set_stop_bits<S>(&self, stop_bits: S) -> Result<()>
    where
        S: TryInto<StopBits>,
        SerialError: From<S::Error>,
    {
        let stop_bits = stop_bits.try_into()?;
        update_settings(self.device()?, |s| s.stop_bits = stop_bits)?;
        debug!(%stop_bits, "Stop bits set");
        Ok(())
    }

    /// Set the byte size (`ByteSize` or raw 5 to 8).
    pub fn set_byte_size<B>(&self, byte_size: B) -> Result<()>
    where
        B: TryInto<ByteSize>,
        SerialError: From<B::Error>,
    {
        let byte_size = byte_size.try_into()?;
        update_settings(self.device()?, |s| s.byte_size = byte_size)?;
        debug!(%byte_size, "Byte size set");
        Ok(())
    }

    /// Set the parity (`Parity` or raw code 0 to 4).
    pub fn set_parity<P>(&self, parity: P) -> Result<()>
    where
        P: TryInto<Parity>,
        SerialError: From<P::Error>,
    {
        let parity = parity.try_into()?;
        update_settings(self.device()?, |s| s.parity = parity)?;
        debug!(%parity, "Parity set");
        Ok(())
    }

    /// Apply one of the handshake profiles (`Handshake` or raw code 0 to 2).
    /// All six flow-control lines change together.
    pub fn set_handshaking<H>(&self, mode: H) -> Result<()>
    where
        H: TryInto<Handshake>,
        SerialError: From<H::Error>,
    {
        let mode = mode.try_into()?;
        update_settings(self.device()?, |s| s.handshake = mode.lines())?;
        debug!(?mode, "Handshaking set");
        Ok(())
    }

    /// Commit a complete set of line settings in one step.
    pub fn apply_settings(&self, settings: &LineSettings) -> Result<()> {
        let device = self.device()?;
        device.lock().write_settings(settings)?;
        debug!(?settings, "Line settings applied");
        Ok(())
    }

    /// Install a timeout policy.
    pub fn set_timeouts(&self, timeouts: Timeouts) -> Result<()> {
        let device = self.device()?;
        device.lock().set_timeouts(&timeouts)?;
        Ok(())
    }

    /// Write the whole buffer in one blocking operation.
    ///
    /// Returns the number of bytes written.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let device = self.device()?;
        let written = device.lock().write_bytes(data)?;
        debug!(bytes = written, "Wrote to serial port");
        Ok(written)
    }

    /// Write one byte at a time, sleeping `delay` between bytes.
    ///
    /// For devices that cannot absorb data at full link speed. The device is
    /// not locked during the sleeps, so the listener keeps reading. On the
    /// first failing byte returns `PartialWrite` with the number of bytes
    /// already written.
    pub fn write_paced(&self, data: &[u8], delay: Duration) -> Result<usize> {
        let device = self.device()?;

        for (index, byte) in data.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                std::thread::sleep(delay);
            }
            if let Err(source) = device.lock().write_bytes(std::slice::from_ref(byte)) {
                warn!(written = index, error = %source, "Paced write failed");
                return Err(SerialError::PartialWrite {
                    written: index,
                    source,
                });
            }
        }

        debug!(bytes = data.len(), ?delay, "Paced write complete");
        Ok(data.len())
    }

    /// Write with the configured inter-byte delay.
    ///
    /// Same as `write` when the delay is zero, otherwise `write_paced`.
    pub fn write_configured(&self, data: &[u8]) -> Result<usize> {
        if self.inter_byte_delay.is_zero() {
            self.write(data)
        } else {
            self.write_paced(data, self.inter_byte_delay)
        }
    }

    fn device(&self) -> Result<&SharedDevice> {
        self.open
            .as_ref()
            .map(|open| &open.device)
            .ok_or(SerialError::NotOpen)
    }
}

impl Default for SerialPort {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SerialPort {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPort")
            .field("device", &self.device_name())
            .field("options", &self.options)
            .field("inter_byte_delay", &self.inter_byte_delay)
            .field("listener", &self.listener_status())
            .finish()
    }
}

/// Fetch the full settings, change one field, commit them back.
fn update_settings(device: &SharedDevice, mutate: impl FnOnce(&mut LineSettings)) -> Result<()> {
    let mut device = device.lock();
    let mut settings = device.read_settings()?;
    mutate(&mut settings);
    device.write_settings(&settings)?;
    Ok(())
}

fn apply_defaults(device: &SharedDevice) -> Result<()> {
    update_settings(device, |s| s.baud_rate = BaudRate::B9600)?;
    update_settings(device, |s| s.stop_bits = StopBits::One)?;
    update_settings(device, |s| s.byte_size = ByteSize::Eight)?;
    update_settings(device, |s| s.parity = Parity::None)?;
    update_settings(device, |s| s.handshake = Handshake::Off.lines())?;
    device.lock().set_timeouts(&Timeouts::default())?;
    Ok(())
}
