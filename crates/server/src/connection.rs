//! Outbound side of a transport connection.

use thiserror::Error;
use tokio::sync::mpsc;

/// Process-unique connection id assigned by the transport.
pub type ConnectionId = u64;

/// The peer's receiving half was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("connection {0} is closed")]
pub struct ConnectionClosed(pub ConnectionId);

/// Fire-and-forget sender for one connection.
///
/// Frames are queued on an unbounded channel drained by the connection's
/// writer task, so sending never blocks the dispatcher.
#[derive(Debug, Clone)]
pub struct Outbound {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<String>,
}

impl Outbound {
    pub fn new(id: ConnectionId, tx: mpsc::UnboundedSender<String>) -> Self {
        Self { id, tx }
    }

    /// Create a connected pair, handy for tests and in-process clients.
    pub fn channel(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(id, tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether the writer side is still accepting frames.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    pub fn send(&self, frame: impl Into<String>) -> Result<(), ConnectionClosed> {
        self.tx.send(frame.into()).map_err(|_| ConnectionClosed(self.id))
    }
}
