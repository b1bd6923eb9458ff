//! Utility functions for hardware testing.
//!
//! Provides port discovery, the environment-driven fixture and timing.

use serial_listener::{BaudRate, SerialPort};
use serialport::{available_ports, SerialPortInfo, SerialPortType};
use std::env;
use std::time::{Duration, Instant};

/// Test port configuration from environment.
pub struct TestPortConfig {
    pub port_name: String,
    pub baud_rate: BaudRate,
    pub loopback_enabled: bool,
}

impl TestPortConfig {
    /// Read `TEST_PORT`, `TEST_BAUD` (default 9600) and `TEST_LOOPBACK`.
    pub fn from_env() -> Option<Self> {
        let port_name = env::var("TEST_PORT").ok()?;
        let baud_rate = env::var("TEST_BAUD")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .and_then(|raw| BaudRate::try_from(raw).ok())
            .unwrap_or(BaudRate::B9600);
        let loopback_enabled = env::var("TEST_LOOPBACK").ok().as_deref() == Some("1");

        Some(TestPortConfig {
            port_name,
            baud_rate,
            loopback_enabled,
        })
    }
}

/// Discover all available serial ports on the system.
pub fn discover_available_ports() -> Vec<SerialPortInfo> {
    available_ports().unwrap_or_default()
}

/// Print available ports for debugging.
pub fn print_available_ports() {
    let ports = discover_available_ports();
    if ports.is_empty() {
        println!("No serial ports detected on this system");
        return;
    }

    println!("Available serial ports ({}):", ports.len());
    for port in &ports {
        let kind = match &port.port_type {
            SerialPortType::UsbPort(usb) => format!("USB {:04x}:{:04x}", usb.vid, usb.pid),
            SerialPortType::BluetoothPort => "Bluetooth".to_string(),
            SerialPortType::PciPort => "PCI".to_string(),
            SerialPortType::Unknown => "Unknown".to_string(),
        };
        println!("  {} ({})", port.port_name, kind);
    }
}

/// Check if a specific port is available.
pub fn is_port_available(port_name: &str) -> bool {
    discover_available_ports()
        .iter()
        .any(|p| p.port_name == port_name)
}

/// Timing helper for measuring operation duration.
pub struct TimingHelper {
    start: Instant,
    name: String,
}

impl TimingHelper {
    pub fn new(name: &str) -> Self {
        println!("⏱️  Starting: {}", name);
        TimingHelper {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        println!("✅ Completed: {} in {:?}", self.name, elapsed);
        elapsed
    }
}

/// An opened port plus the environment it came from.
pub struct PortTestFixture {
    pub port: SerialPort,
    pub config: TestPortConfig,
}

impl PortTestFixture {
    /// Open `TEST_PORT` at `TEST_BAUD`, or `None` when no hardware is configured.
    pub fn setup() -> Option<Self> {
        let config = TestPortConfig::from_env()?;
        println!(
            "Setting up test fixture for {} at {} baud",
            config.port_name, config.baud_rate
        );

        let mut port = SerialPort::new();
        if let Err(e) = port.open(&config.port_name) {
            println!("Failed to open port: {}", e);
            return None;
        }
        if let Err(e) = port.set_baud_rate(config.baud_rate) {
            println!("Failed to set baud rate: {}", e);
            return None;
        }

        Some(PortTestFixture { port, config })
    }

    pub fn is_loopback(&self) -> bool {
        self.config.loopback_enabled
    }
}
