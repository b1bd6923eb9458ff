//! Receive handlers.
//!
//! A handler is the single observer the receive listener delivers to. Any
//! `FnMut(&[u8])` closure qualifies; `ChannelHandler` forwards deliveries
//! into a bounded Tokio channel for owners that would rather drain a queue.

use crate::port::SerialError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// How long `ChannelHandler` sleeps before retrying a full channel.
const FULL_CHANNEL_RETRY: Duration = Duration::from_millis(1);

/// Raised when the listener a handler is attached to starts shutting down.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the listener has been asked to stop.
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Receives data from the listener thread.
///
/// Called on the listener's own thread, once per completed read. The slice is
/// only valid for the duration of the call, and a handler that blocks stalls
/// subsequent reads. Closing the port joins the listener, so a handler that
/// may block should watch the `StopSignal` passed to `attach`.
pub trait ReceiveHandler: Send {
    /// Bytes from one read, in arrival order. May be empty.
    fn on_data(&mut self, data: &[u8]);

    /// A listener is about to deliver to this handler.
    ///
    /// Called before the listener thread starts, and again whenever the
    /// handler is registered on an open port.
    fn attach(&mut self, stop: StopSignal) {
        let _ = stop;
    }

    /// The listener hit a fatal error and is about to stop.
    fn on_error(&mut self, error: &SerialError) {
        let _ = error;
    }
}

impl<F> ReceiveHandler for F
where
    F: FnMut(&[u8]) + Send,
{
    fn on_data(&mut self, data: &[u8]) {
        self(data)
    }
}

/// The handler slot shared by a port and its listener.
pub(crate) type SharedHandler = Arc<Mutex<Option<Box<dyn ReceiveHandler>>>>;

/// One delivery forwarded by `ChannelHandler`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveEvent {
    /// Bytes from one read.
    Data(Vec<u8>),
    /// The listener stopped with this error.
    Failed(SerialError),
}

/// Forwards deliveries into a bounded channel.
///
/// When the channel is full the listener waits for the owner to drain it,
/// until the port starts closing. Deliveries that still find the channel full
/// at that point are dropped and counted in `dropped()`.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::Sender<ReceiveEvent>,
    stop: Option<StopSignal>,
    dropped: Arc<AtomicU64>,
}

/// Create a channel handler and the receiver the owner drains.
///
/// # Example
/// ```no_run
/// use serial_listener::{receive_channel, ReceiveEvent, SerialPort};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (handler, mut events) = receive_channel(64);
/// let mut port = SerialPort::new();
/// port.register_listener(handler);
/// port.open("/dev/ttyUSB0")?;
///
/// while let Some(ReceiveEvent::Data(bytes)) = events.recv().await {
///     println!("{} byte(s)", bytes.len());
/// }
/// # Ok(())
/// # }
/// ```
pub fn receive_channel(capacity: usize) -> (ChannelHandler, mpsc::Receiver<ReceiveEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    let handler = ChannelHandler {
        tx,
        stop: None,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (handler, rx)
}

impl ChannelHandler {
    /// Deliveries dropped because the channel was still full at close.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn stopping(&self) -> bool {
        self.stop.as_ref().is_some_and(StopSignal::is_raised)
    }

    fn forward(&self, mut event: ReceiveEvent) {
        loop {
            match self.tx.try_send(event) {
                Ok(()) => return,
                Err(TrySendError::Closed(_)) => {
                    debug!("Receive channel closed; dropping delivery");
                    return;
                }
                Err(TrySendError::Full(pending)) => {
                    if self.stopping() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        warn!("Receive channel full while closing; dropping delivery");
                        return;
                    }
                    event = pending;
                    thread::sleep(FULL_CHANNEL_RETRY);
                }
            }
        }
    }
}

impl ReceiveHandler for ChannelHandler {
    fn attach(&mut self, stop: StopSignal) {
        self.stop = Some(stop);
    }

    fn on_data(&mut self, data: &[u8]) {
        self.forward(ReceiveEvent::Data(data.to_vec()));
    }

    fn on_error(&mut self, error: &SerialError) {
        self.forward(ReceiveEvent::Failed(error.clone()));
    }
}
