//! Mock serial device for testing.
//!
//! Provides a `MockSerialDevice` that simulates a serial device without
//! requiring actual hardware, and a `MockConnector` that hands registered
//! mocks out by name. Supports loopback, injected input, a write log and
//! fault injection for every device call.

use super::os_error::OsError;
use super::traits::{
    DeviceConnector, LineSettings, RxEventSource, SerialDevice, Timeouts, WaitOutcome,
};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Error code reported by injected faults.
pub const INJECTED_FAULT_CODE: i32 = 1117;

/// Faults the mock device should simulate.
#[derive(Debug, Clone, Default)]
pub struct MockFaults {
    /// Fail every settings fetch.
    pub fail_read_settings: bool,
    /// Fail every settings commit.
    pub fail_write_settings: bool,
    /// Fail installing timeouts.
    pub fail_timeouts: bool,
    /// Fail the n-th write call (1-based, counted since the device was created).
    pub fail_write_at: Option<usize>,
    /// Number of upcoming reads that fail.
    pub failing_reads: usize,
    /// Number of upcoming reads that return zero bytes without draining input.
    pub empty_reads: usize,
    /// Fail creating the readiness source.
    pub fail_event_source: bool,
    /// Fail arming the readiness source.
    pub fail_arm: bool,
    /// Fail every wait.
    pub fail_wait: bool,
}

/// Inner state of the mock device.
#[derive(Debug, Default)]
struct MockDeviceState {
    settings: LineSettings,
    timeouts: Option<Timeouts>,
    /// Bytes waiting to be read.
    rx_queue: VecDeque<u8>,
    /// One entry per successful write call.
    write_log: Vec<Vec<u8>>,
    /// Feed written bytes back into the receive queue.
    loopback: bool,
    faults: MockFaults,
    write_calls: usize,
    read_calls: usize,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MockDeviceState>,
    data_arrived: Condvar,
    in_use: AtomicBool,
}

impl Shared {
    fn push_rx(&self, data: &[u8]) {
        let mut state = self.state.lock();
        state.rx_queue.extend(data);
        self.data_arrived.notify_all();
    }
}

/// Mock serial device.
///
/// Clones share state, so a test keeps one clone for inspection while the
/// port owns another.
///
/// # Example
/// ```
/// use serial_listener::port::{MockSerialDevice, SerialDevice};
///
/// let mut device = MockSerialDevice::new("MOCK0");
/// device.inject_read(b"Hello");
///
/// let mut buffer = [0u8; 16];
/// let n = device.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"Hello");
///
/// device.write_bytes(b"Response").unwrap();
/// assert_eq!(device.write_log(), vec![b"Response".to_vec()]);
/// ```
#[derive(Clone)]
pub struct MockSerialDevice {
    name: String,
    shared: Arc<Shared>,
    /// Set on the copy handed out by `MockConnector`; dropping it frees the device.
    leased: bool,
}

impl MockSerialDevice {
    /// Create a new mock device with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared::default()),
            leased: false,
        }
    }

    /// Create a mock device that echoes every write back as received data.
    pub fn loopback(name: impl Into<String>) -> Self {
        let device = Self::new(name);
        device.set_loopback(true);
        device
    }

    pub fn set_loopback(&self, enabled: bool) {
        self.shared.state.lock().loopback = enabled;
    }

    /// Make bytes available to subsequent reads and wake any waiter.
    pub fn inject_read(&self, data: &[u8]) {
        self.shared.push_rx(data);
    }

    /// Get a copy of every successful write, one entry per call.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.shared.state.lock().write_log.clone()
    }

    /// All written bytes, concatenated.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.shared.state.lock().write_log.concat()
    }

    pub fn clear_write_log(&self) {
        self.shared.state.lock().write_log.clear();
    }

    /// The settings last committed, bypassing fault injection.
    pub fn current_settings(&self) -> LineSettings {
        self.shared.state.lock().settings
    }

    /// The timeouts last installed, if any.
    pub fn timeouts(&self) -> Option<Timeouts> {
        self.shared.state.lock().timeouts
    }

    /// Replace the active fault set.
    pub fn set_faults(&self, faults: MockFaults) {
        self.shared.state.lock().faults = faults;
    }

    /// Adjust the active fault set in place.
    pub fn update_faults(&self, update: impl FnOnce(&mut MockFaults)) {
        update(&mut self.shared.state.lock().faults);
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.shared.state.lock().rx_queue.len()
    }

    /// Number of read calls made so far.
    pub fn read_calls(&self) -> usize {
        self.shared.state.lock().read_calls
    }

    /// Whether a connector has handed this device out and it is still held.
    pub fn is_in_use(&self) -> bool {
        self.shared.in_use.load(Ordering::Acquire)
    }

    fn fault(operation: &str) -> OsError {
        OsError::new(INJECTED_FAULT_CODE, format!("injected {operation} failure"))
    }
}

impl SerialDevice for MockSerialDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_settings(&self) -> Result<LineSettings, OsError> {
        let state = self.shared.state.lock();
        if state.faults.fail_read_settings {
            return Err(Self::fault("settings fetch"));
        }
        Ok(state.settings)
    }

    fn write_settings(&mut self, settings: &LineSettings) -> Result<(), OsError> {
        let mut state = self.shared.state.lock();
        if state.faults.fail_write_settings {
            return Err(Self::fault("settings commit"));
        }
        state.settings = *settings;
        Ok(())
    }

    fn set_timeouts(&mut self, timeouts: &Timeouts) -> Result<(), OsError> {
        let mut state = self.shared.state.lock();
        if state.faults.fail_timeouts {
            return Err(Self::fault("timeouts"));
        }
        state.timeouts = Some(*timeouts);
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, OsError> {
        let mut state = self.shared.state.lock();
        state.write_calls += 1;
        if state.faults.fail_write_at == Some(state.write_calls) {
            return Err(Self::fault("write"));
        }

        state.write_log.push(data.to_vec());
        if state.loopback {
            state.rx_queue.extend(data);
            self.shared.data_arrived.notify_all();
        }
        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, OsError> {
        let mut state = self.shared.state.lock();
        state.read_calls += 1;
        if state.faults.failing_reads > 0 {
            state.faults.failing_reads -= 1;
            return Err(Self::fault("read"));
        }
        if state.faults.empty_reads > 0 {
            state.faults.empty_reads -= 1;
            return Ok(0);
        }

        let count = buffer.len().min(state.rx_queue.len());
        for (slot, byte) in buffer.iter_mut().zip(state.rx_queue.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn event_source(&mut self) -> Result<Box<dyn RxEventSource>, OsError> {
        if self.shared.state.lock().faults.fail_event_source {
            return Err(Self::fault("event source"));
        }
        Ok(Box::new(MockEventSource {
            shared: Arc::clone(&self.shared),
        }))
    }
}

impl Drop for MockSerialDevice {
    fn drop(&mut self) {
        if self.leased {
            self.shared.in_use.store(false, Ordering::Release);
        }
    }
}

impl std::fmt::Debug for MockSerialDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialDevice")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}

/// Readiness source backed by the mock's receive queue.
struct MockEventSource {
    shared: Arc<Shared>,
}

impl RxEventSource for MockEventSource {
    fn arm(&mut self) -> Result<(), OsError> {
        if self.shared.state.lock().faults.fail_arm {
            return Err(MockSerialDevice::fault("arm"));
        }
        Ok(())
    }

    fn wait(&mut self, timeout: Duration) -> Result<WaitOutcome, OsError> {
        let mut state = self.shared.state.lock();
        if state.faults.fail_wait {
            return Err(MockSerialDevice::fault("wait"));
        }
        if state.rx_queue.is_empty() {
            self.shared.data_arrived.wait_for(&mut state, timeout);
        }
        if state.rx_queue.is_empty() {
            Ok(WaitOutcome::Pending)
        } else {
            Ok(WaitOutcome::DataReady)
        }
    }
}

/// Hands out registered mock devices by name.
///
/// A device can be held by one port at a time; connecting again before the
/// first holder closes fails as "busy".
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    devices: Arc<Mutex<HashMap<String, MockSerialDevice>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device under its own name.
    pub fn add(&self, device: MockSerialDevice) -> &Self {
        self.devices.lock().insert(device.name.clone(), device);
        self
    }

    /// Get a handle to a registered device.
    pub fn device(&self, name: &str) -> Option<MockSerialDevice> {
        self.devices.lock().get(name).cloned()
    }
}

impl DeviceConnector for MockConnector {
    fn connect(&self, device: &str) -> Result<Box<dyn SerialDevice>, OsError> {
        let devices = self.devices.lock();
        let registered = devices.get(device).ok_or_else(|| {
            OsError::new(OsError::NO_DEVICE, format!("no such mock device: {device}"))
        })?;

        if registered.shared.in_use.swap(true, Ordering::AcqRel) {
            return Err(OsError::new(
                OsError::IO,
                format!("mock device {device} is busy"),
            ));
        }

        let mut leased = registered.clone();
        leased.leased = true;
        Ok(Box::new(leased))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::traits::Parity;

    #[test]
    fn test_inject_and_read() {
        let mut device = MockSerialDevice::new("MOCK0");
        device.inject_read(b"Hello");

        let mut buffer = [0u8; 10];
        let n = device.read_bytes(&mut buffer).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buffer[..n], b"Hello");
    }

    #[test]
    fn test_empty_read_returns_zero() {
        let mut device = MockSerialDevice::new("MOCK0");
        let mut buffer = [0u8; 10];
        assert_eq!(device.read_bytes(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn test_partial_read() {
        let mut device = MockSerialDevice::new("MOCK0");
        device.inject_read(b"Hello, World!");

        let mut buffer = [0u8; 5];
        let n = device.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"Hello");
        assert_eq!(device.available_bytes(), 8);
    }

    #[test]
    fn test_write_logging_and_loopback() {
        let mut device = MockSerialDevice::loopback("MOCK0");
        device.write_bytes(b"Test1").unwrap();
        device.write_bytes(b"Test2").unwrap();

        assert_eq!(device.write_log(), vec![b"Test1".to_vec(), b"Test2".to_vec()]);
        assert_eq!(device.available_bytes(), 10);
    }

    #[test]
    fn test_fail_write_at() {
        let mut device = MockSerialDevice::new("MOCK0");
        device.update_faults(|f| f.fail_write_at = Some(2));

        assert!(device.write_bytes(b"a").is_ok());
        let err = device.write_bytes(b"b").unwrap_err();
        assert_eq!(err.code(), INJECTED_FAULT_CODE);
        assert!(device.write_bytes(b"c").is_ok());
        assert_eq!(device.written_bytes(), b"ac");
    }

    #[test]
    fn test_settings_round_trip_and_faults() {
        let mut device = MockSerialDevice::new("MOCK0");
        let mut settings = device.read_settings().unwrap();
        settings.parity = Parity::Mark;
        device.write_settings(&settings).unwrap();
        assert_eq!(device.current_settings().parity, Parity::Mark);

        device.update_faults(|f| f.fail_write_settings = true);
        settings.parity = Parity::Even;
        assert!(device.write_settings(&settings).is_err());
        assert_eq!(device.current_settings().parity, Parity::Mark);
    }

    #[test]
    fn test_wait_times_out_then_sees_data() {
        let mut device = MockSerialDevice::new("MOCK0");
        let mut events = device.event_source().unwrap();
        events.arm().unwrap();

        assert_eq!(
            events.wait(Duration::from_millis(5)).unwrap(),
            WaitOutcome::Pending
        );

        device.inject_read(b"x");
        assert_eq!(
            events.wait(Duration::from_millis(5)).unwrap(),
            WaitOutcome::DataReady
        );
    }

    #[test]
    fn test_wait_wakes_on_injection_from_other_thread() {
        let mut device = MockSerialDevice::new("MOCK0");
        let mut events = device.event_source().unwrap();
        let feeder = device.clone();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            feeder.inject_read(b"late");
        });

        let outcome = events.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome, WaitOutcome::DataReady);
        handle.join().unwrap();
    }

    #[test]
    fn test_connector_exclusive_lease() {
        let connector = MockConnector::new();
        connector.add(MockSerialDevice::new("MOCK0"));

        let first = connector.connect("MOCK0").unwrap();
        assert!(connector.device("MOCK0").unwrap().is_in_use());
        assert!(connector.connect("MOCK0").is_err());

        drop(first);
        assert!(!connector.device("MOCK0").unwrap().is_in_use());
        assert!(connector.connect("MOCK0").is_ok());
    }

    #[test]
    fn test_connector_unknown_device() {
        let connector = MockConnector::new();
        let err = connector.connect("MOCK9").unwrap_err();
        assert_eq!(err.code(), OsError::NO_DEVICE);
    }
}
