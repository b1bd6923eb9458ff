//! Background receive listener.
//!
//! One listener thread runs per open port. It waits on the device's readiness
//! source, reads whatever is available into a transient buffer and delivers
//! the bytes to the registered handler, until the quit flag is raised.
//!
//! ```text
//! Created ──> Armed ──> Waiting ⇄ Reading
//!                          │         │
//!                          └────┬────┘
//!                               v
//!                            Stopped
//! ```
//!
//! Waits are bounded by the poll interval, so a quit request is observed
//! within one poll interval plus one read.

mod handler;

pub use handler::{receive_channel, ChannelHandler, ReceiveEvent, ReceiveHandler, StopSignal};
pub(crate) use handler::SharedHandler;

use crate::port::{Result, SerialDevice, SerialError, WaitOutcome};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Default receive buffer capacity.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Default bound on a single wait.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// The device shared by a port and its listener.
pub(crate) type SharedDevice = Arc<Mutex<Box<dyn SerialDevice>>>;

/// Largest accepted receive buffer.
pub const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Tuning for the receive listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Capacity of the receive buffer; one read never delivers more.
    pub buffer_size: usize,
    /// Upper bound on one wait, and so on shutdown latency.
    pub poll_interval: Duration,
}

impl ListenerOptions {
    /// Check that the buffer holds at least one byte and no more than
    /// `MAX_BUFFER_SIZE`, and that the poll interval is nonzero.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_BUFFER_SIZE).contains(&self.buffer_size) {
            return Err(SerialError::invalid("buffer size", self.buffer_size));
        }
        if self.poll_interval.is_zero() {
            return Err(SerialError::invalid(
                "poll interval",
                format!("{:?}", self.poll_interval),
            ));
        }
        Ok(())
    }
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Where the listener is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Thread started, no readiness source yet.
    Created,
    /// Readiness source created and armed.
    Armed,
    /// Blocked waiting for data.
    Waiting,
    /// Reading and delivering.
    Reading,
    /// Exited; terminal.
    Stopped,
}

/// Snapshot of a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerStatus {
    pub state: ListenerState,
    /// Why the listener stopped, if it died rather than being asked to quit.
    pub error: Option<SerialError>,
    /// Completed deliveries.
    pub deliveries: u64,
    pub bytes_received: u64,
}

impl ListenerStatus {
    fn new() -> Self {
        Self {
            state: ListenerState::Created,
            error: None,
            deliveries: 0,
            bytes_received: 0,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.state == ListenerState::Stopped
    }
}

/// Handle to a running receive listener.
///
/// Dropping the handle raises the quit flag and joins the thread.
pub struct ReceiveListener {
    quit: StopSignal,
    status: Arc<Mutex<ListenerStatus>>,
    thread: Option<JoinHandle<()>>,
}

impl ReceiveListener {
    /// Start a listener thread for `device`.
    pub(crate) fn spawn(
        device: SharedDevice,
        handler: SharedHandler,
        options: ListenerOptions,
    ) -> Result<Self> {
        options.validate()?;
        let name = device.lock().name().to_string();
        let quit = StopSignal::new();
        let status = Arc::new(Mutex::new(ListenerStatus::new()));
        if let Some(handler) = handler.lock().as_mut() {
            handler.attach(quit.clone());
        }

        let worker = Worker {
            device,
            handler,
            quit: quit.clone(),
            status: Arc::clone(&status),
            options,
            name: name.clone(),
        };
        let thread = thread::Builder::new()
            .name(format!("serial-rx {name}"))
            .spawn(move || worker.run())
            .map_err(|e| SerialError::DeviceError(e.into()))?;

        Ok(Self {
            quit,
            status,
            thread: Some(thread),
        })
    }

    /// Get a snapshot of the listener's state.
    pub fn status(&self) -> ListenerStatus {
        self.status.lock().clone()
    }

    /// Ask the listener to stop after its current iteration.
    pub fn request_stop(&self) {
        self.quit.raise();
    }

    /// The signal raised when this listener is asked to stop.
    pub(crate) fn stop_signal(&self) -> StopSignal {
        self.quit.clone()
    }

    /// Whether the listener thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop the listener and wait for its thread to exit.
    pub fn shutdown(mut self) -> ListenerStatus {
        self.stop_and_join();
        self.status()
    }

    fn stop_and_join(&mut self) {
        self.request_stop();
        let Some(thread) = self.thread.take() else {
            return;
        };
        if thread.thread().id() == thread::current().id() {
            // Closing from inside a handler; the loop exits on its own.
            return;
        }
        if thread.join().is_err() {
            error!("Receive listener thread panicked");
            self.status.lock().state = ListenerState::Stopped;
        }
    }
}

impl Drop for ReceiveListener {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

impl std::fmt::Debug for ReceiveListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiveListener")
            .field("status", &*self.status.lock())
            .field("quit", &self.quit.is_raised())
            .finish()
    }
}

/// State owned by the listener thread.
struct Worker {
    device: SharedDevice,
    handler: SharedHandler,
    quit: StopSignal,
    status: Arc<Mutex<ListenerStatus>>,
    options: ListenerOptions,
    name: String,
}

impl Worker {
    fn run(self) {
        debug!(device = %self.name, "Receive listener started");

        match self.listen() {
            Ok(()) => info!(device = %self.name, "Receive listener stopped"),
            Err(err) => {
                error!(device = %self.name, error = %err, "Receive listener failed");
                self.status.lock().error = Some(err.clone());
                if let Some(handler) = self.handler.lock().as_mut() {
                    handler.on_error(&err);
                }
            }
        }

        self.set_state(ListenerState::Stopped);
    }

    fn listen(&self) -> Result<()> {
        let mut events = self
            .device
            .lock()
            .event_source()
            .map_err(SerialError::Listener)?;
        events.arm().map_err(SerialError::Listener)?;
        self.set_state(ListenerState::Armed);

        let mut buffer = vec![0u8; self.options.buffer_size];

        while !self.quit.is_raised() {
            self.set_state(ListenerState::Waiting);
            let outcome = events
                .wait(self.options.poll_interval)
                .map_err(SerialError::Listener)?;
            if outcome == WaitOutcome::Pending || self.quit.is_raised() {
                continue;
            }

            self.set_state(ListenerState::Reading);
            let read = self.device.lock().read_bytes(&mut buffer);
            match read {
                Ok(count) => self.deliver(&buffer[..count]),
                Err(err) => {
                    warn!(device = %self.name, error = %err, "Serial read failed; continuing");
                }
            }
        }

        Ok(())
    }

    fn deliver(&self, data: &[u8]) {
        trace!(device = %self.name, bytes = data.len(), "Delivering received data");
        {
            let mut status = self.status.lock();
            status.deliveries += 1;
            status.bytes_received += data.len() as u64;
        }
        if let Some(handler) = self.handler.lock().as_mut() {
            handler.on_data(data);
        }
    }

    fn set_state(&self, state: ListenerState) {
        let mut status = self.status.lock();
        if status.state != state {
            trace!(device = %self.name, from = ?status.state, to = ?state, "Listener state");
            status.state = state;
        }
    }
}
