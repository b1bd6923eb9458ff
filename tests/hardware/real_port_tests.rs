//! Tests requiring actual serial hardware.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! export TEST_PORT=/dev/ttyUSB0          # or COM3 on Windows
//! export TEST_BAUD=9600                  # optional, default: 9600
//! export TEST_LOOPBACK=1                 # if port has TX-RX loopback
//!
//! cargo test --features hardware-tests -- --ignored
//! ```

use super::utils::{is_port_available, print_available_ports, PortTestFixture, TimingHelper};
use crate::common::{Collector, RECEIVE_TIMEOUT};
use serial_listener::{BaudRate, Handshake, Parity, SerialError, SerialPort, StopBits};
use std::time::Duration;

#[test]
#[ignore] // Run with --ignored flag
fn test_real_port_open_applies_defaults() {
    let Some(fixture) = PortTestFixture::setup() else {
        println!("⏭️  Skipping hardware test: TEST_PORT not set");
        return;
    };

    let settings = fixture.port.settings().expect("read back settings");
    assert_eq!(settings.baud_rate, fixture.config.baud_rate);
    assert_eq!(settings.stop_bits, StopBits::One);
    assert_eq!(settings.parity, Parity::None);
    assert_eq!(settings.handshake.profile(), Some(Handshake::Off));
}

#[test]
#[ignore]
fn test_real_port_reconfigure() {
    let Some(fixture) = PortTestFixture::setup() else {
        return;
    };
    let port = &fixture.port;

    for baud in [BaudRate::B19200, BaudRate::B57600, BaudRate::B115200] {
        port.set_baud_rate(baud).expect("set baud rate");
        assert_eq!(port.settings().unwrap().baud_rate, baud);
    }

    match port.set_parity(Parity::Even) {
        Ok(()) => assert_eq!(port.settings().unwrap().parity, Parity::Even),
        Err(e) => panic!("even parity should be supported: {e}"),
    }

    // Mark parity has no portable driver mapping.
    let before = port.settings().unwrap();
    if let Err(err) = port.set_parity(Parity::Mark) {
        assert!(matches!(err, SerialError::DeviceError(_)));
        assert_eq!(port.settings().unwrap(), before);
    }
}

#[test]
#[ignore]
fn test_real_port_loopback_listener() {
    let Some(fixture) = PortTestFixture::setup() else {
        return;
    };
    if !fixture.is_loopback() {
        println!("⏭️  Skipping loopback test: TEST_LOOPBACK not set to 1");
        return;
    }

    let collector = Collector::new();
    fixture.port.register_listener(collector.clone());

    let timing = TimingHelper::new("loopback round trip");
    let test_data = b"LOOPBACK TEST\r\n";
    assert_eq!(fixture.port.write(test_data).unwrap(), test_data.len());

    let received = collector.wait_for_bytes(test_data.len(), RECEIVE_TIMEOUT);
    timing.finish();
    assert_eq!(received, test_data);
}

#[test]
#[ignore]
fn test_real_port_paced_write() {
    let Some(fixture) = PortTestFixture::setup() else {
        return;
    };

    let timing = TimingHelper::new("paced write");
    let written = fixture
        .port
        .write_paced(b"PACED", Duration::from_millis(10))
        .expect("paced write");
    let elapsed = timing.finish();

    assert_eq!(written, 5);
    assert!(elapsed >= Duration::from_millis(40));
}

#[test]
#[ignore]
fn test_real_port_close_and_reopen() {
    let Some(mut fixture) = PortTestFixture::setup() else {
        return;
    };
    let name = fixture.config.port_name.clone();

    fixture.port.close();
    assert!(!fixture.port.is_open());
    fixture.port.open(&name).expect("reopen after close");
    assert!(fixture.port.listener_status().is_some());
}

#[test]
#[ignore]
fn test_nonexistent_port_is_unavailable() {
    print_available_ports();
    let name = if cfg!(windows) {
        "COM250"
    } else {
        "/dev/ttyNONEXISTENT0"
    };
    assert!(!is_port_available(name));

    let mut port = SerialPort::new();
    assert!(matches!(
        port.open(name),
        Err(SerialError::DeviceUnavailable { .. })
    ));
}
