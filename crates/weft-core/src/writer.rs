//! The event multiplexer — a single shared, ordered outbound channel.
//!
//! Any component may append an event; append order becomes stream order.
//! Writes are FIFO per caller and events are atomic units, so cross-run
//! interleaving can only happen between complete events, never inside one.

use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::WireEvent;

/// Cheap, cloneable handle onto the outbound event stream.
#[derive(Debug, Clone)]
pub struct EventWriter {
    tx: mpsc::UnboundedSender<WireEvent>,
}

impl EventWriter {
    /// Create the outbound channel. The receiver side is handed to the
    /// consuming session; every producer clones the writer.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WireEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Append an event to the outbound stream. Returns immediately; there is
    /// no acknowledgement, deduplication, or backpressure. Once the consumer
    /// is gone the event is dropped.
    pub fn write(&self, event: WireEvent) {
        if self.tx.send(event).is_err() {
            debug!("outbound event dropped, consumer gone");
        }
    }
}
