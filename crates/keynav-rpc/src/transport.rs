//! One-way transports.
//!
//! A [`Transport`] only posts messages; it never replies. The inbound side
//! of a connection is a plain receiver handed to the channel alongside it,
//! bundled as an [`Endpoint`]. The stream ending means the peer closed.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::errors::TransportError;

/// Fire-and-forget message delivery to the peer.
pub trait Transport: Send + Sync {
    /// Post one message. Delivery is not acknowledged.
    fn post(&self, message: Value) -> Result<(), TransportError>;

    /// Close the outbound side. The peer's inbound stream ends.
    fn close(&self);
}

/// Both halves of one side of a connection.
pub struct Endpoint {
    /// Outbound half.
    pub transport: Arc<dyn Transport>,
    /// Inbound half.
    pub inbound: mpsc::UnboundedReceiver<Value>,
}

/// In-process transport backed by an unbounded tokio channel.
pub struct MemoryTransport {
    peer: Mutex<Option<mpsc::UnboundedSender<Value>>>,
}

impl MemoryTransport {
    /// Two linked endpoints: what one posts, the other receives.
    pub fn pair() -> (Endpoint, Endpoint) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        let a = Endpoint {
            transport: Arc::new(Self {
                peer: Mutex::new(Some(b_tx)),
            }),
            inbound: a_rx,
        };
        let b = Endpoint {
            transport: Arc::new(Self {
                peer: Mutex::new(Some(a_tx)),
            }),
            inbound: b_rx,
        };
        (a, b)
    }
}

impl Transport for MemoryTransport {
    fn post(&self, message: Value) -> Result<(), TransportError> {
        let guard = self.peer.lock();
        let tx = guard.as_ref().ok_or(TransportError::Closed)?;
        tx.send(message).map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        drop(self.peer.lock().take());
    }
}
