//! Echo demo.
//!
//! Opens a port, prints everything the receive listener delivers, and writes
//! a few lines to it. Without arguments it runs against an in-memory loopback
//! device, so it works without hardware:
//!
//! ```bash
//! cargo run --example echo_listener                 # loopback mock
//! cargo run --example echo_listener -- /dev/ttyUSB0 # real device
//! RUST_LOG=serial_listener=trace cargo run --example echo_listener
//! ```

use serial_listener::config::ConfigLoader;
use serial_listener::port::{MockConnector, MockSerialDevice};
use serial_listener::{logging, Parity, SerialPort};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const LOOPBACK_DEVICE: &str = "LOOP0";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::with_defaults().into_config();
    logging::init(&config.logging);

    let device = std::env::args().nth(1);
    let mut port = match device {
        Some(_) => SerialPort::new(),
        None => {
            let connector = MockConnector::new();
            connector.add(MockSerialDevice::loopback(LOOPBACK_DEVICE));
            SerialPort::with_connector(Arc::new(connector))
        }
    }
    .with_listener_options(config.listener.options());

    port.register_listener(|data: &[u8]| {
        println!("<- {:?}", String::from_utf8_lossy(data));
    });

    let name = device.as_deref().unwrap_or(LOOPBACK_DEVICE);
    port.open(&config.serial.resolve_device(name))?;
    port.apply_settings(&config.serial.line.to_settings())?;
    port.set_baud_rate(19200u32)?;
    port.set_parity(Parity::Odd)?;
    info!(settings = ?port.settings()?, "Port configured");

    port.write(b"ABC")?;
    std::thread::sleep(Duration::from_millis(50));

    port.set_inter_byte_delay(config.write.inter_byte_delay().max(Duration::from_millis(5)));
    port.write_configured(b"slow and steady")?;
    std::thread::sleep(Duration::from_millis(100));

    if let Some(status) = port.listener_status() {
        info!(
            deliveries = status.deliveries,
            bytes = status.bytes_received,
            "Listener summary"
        );
    }
    port.close();
    Ok(())
}
