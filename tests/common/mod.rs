//! Shared test utilities for serial_listener tests.
//!
//! This module provides common test infrastructure including:
//! - Mock port creation backed by a `MockConnector`
//! - A collecting receive handler that can wait for a byte count

#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use serial_listener::port::{MockConnector, MockSerialDevice};
use serial_listener::{ListenerOptions, ReceiveHandler, SerialError, SerialPort};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Short poll interval so shutdown-latency tests stay quick.
pub const TEST_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Generous upper bound for waiting on the listener thread.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);

/// A closed port whose connector knows one mock device, plus a handle on
/// that device for inspection.
pub fn mock_port(device_name: &str) -> (SerialPort, MockSerialDevice) {
    mock_port_with(MockSerialDevice::new(device_name))
}

/// Like `mock_port`, but the device echoes writes back as input.
pub fn loopback_port(device_name: &str) -> (SerialPort, MockSerialDevice) {
    mock_port_with(MockSerialDevice::loopback(device_name))
}

pub fn mock_port_with(device: MockSerialDevice) -> (SerialPort, MockSerialDevice) {
    let connector = MockConnector::new();
    connector.add(device.clone());
    let port = SerialPort::with_connector(Arc::new(connector)).with_listener_options(
        ListenerOptions {
            poll_interval: TEST_POLL_INTERVAL,
            ..ListenerOptions::default()
        },
    );
    (port, device)
}

/// Open a mock port, panicking on failure.
pub fn open_mock_port(device_name: &str) -> (SerialPort, MockSerialDevice) {
    let (mut port, device) = mock_port(device_name);
    port.open(device_name).expect("mock port should open");
    (port, device)
}

#[derive(Default)]
struct Received {
    deliveries: Vec<Vec<u8>>,
    errors: Vec<SerialError>,
}

/// Receive handler that records every delivery.
///
/// Clones share the record, so a test registers one clone and keeps another.
#[derive(Clone, Default)]
pub struct Collector {
    inner: Arc<(Mutex<Received>, Condvar)>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every byte delivered so far, concatenated in delivery order.
    pub fn bytes(&self) -> Vec<u8> {
        self.inner.0.lock().deliveries.concat()
    }

    /// Deliveries so far, one entry per handler call.
    pub fn deliveries(&self) -> Vec<Vec<u8>> {
        self.inner.0.lock().deliveries.clone()
    }

    pub fn errors(&self) -> Vec<SerialError> {
        self.inner.0.lock().errors.clone()
    }

    /// Wait until at least `count` bytes have arrived. Returns what arrived.
    pub fn wait_for_bytes(&self, count: usize, timeout: Duration) -> Vec<u8> {
        let deadline = Instant::now() + timeout;
        let (lock, arrived) = &*self.inner;
        let mut received = lock.lock();
        while received.deliveries.iter().map(Vec::len).sum::<usize>() < count {
            if arrived.wait_until(&mut received, deadline).timed_out() {
                break;
            }
        }
        received.deliveries.concat()
    }

    /// Wait until the listener reports an error.
    pub fn wait_for_error(&self, timeout: Duration) -> Option<SerialError> {
        let deadline = Instant::now() + timeout;
        let (lock, arrived) = &*self.inner;
        let mut received = lock.lock();
        while received.errors.is_empty() {
            if arrived.wait_until(&mut received, deadline).timed_out() {
                break;
            }
        }
        received.errors.first().cloned()
    }
}

impl ReceiveHandler for Collector {
    fn on_data(&mut self, data: &[u8]) {
        // Empty reads are delivered but carry nothing worth recording.
        if data.is_empty() {
            return;
        }
        let (lock, arrived) = &*self.inner;
        lock.lock().deliveries.push(data.to_vec());
        arrived.notify_all();
    }

    fn on_error(&mut self, error: &SerialError) {
        let (lock, arrived) = &*self.inner;
        lock.lock().errors.push(error.clone());
        arrived.notify_all();
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}
