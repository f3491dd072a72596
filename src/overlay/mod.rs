//! Overlay adapter - the reliable ordered message channel between peers
//!
//! The tunnel never talks to a transport directly. Whatever carries the
//! messages (a NAT-traversing P2P library, a relay, a plain socket) is
//! wrapped as an [`OverlayConnection`]: a cloneable sender for outbound
//! messages and a single event stream for inbound ones. Transport
//! callbacks land on the event channel and nowhere else, so all state
//! mutation stays inside the pump task.
//!
//! Contract: delivery is reliable and ordered, and every `send` on one
//! peer surfaces as exactly one `Message` on the other.

pub mod link;
pub mod memory;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

/// Overlay errors
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("Overlay connection closed")]
    Closed,

    #[error("Message too large: {0} bytes (max {MAX_MESSAGE_SIZE})")]
    MessageTooLarge(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Largest message an overlay implementation must carry: one maximum-size
/// tunnel packet.
pub const MAX_MESSAGE_SIZE: usize = crate::tunnel::MAX_PACKET_SIZE;

/// Capacity of the outbound and event channels.
pub(crate) const CHANNEL_DEPTH: usize = 256;

/// Lifecycle and traffic events surfaced to the pump.
#[derive(Debug)]
pub enum OverlayEvent {
    /// The channel to the peer is up.
    Connected,
    /// One inbound message, exactly as the peer sent it.
    Message(Bytes),
    /// The peer closed the channel.
    ClosedByPeer(String),
    /// The channel failed on this side.
    LocalProblem(String),
}

/// Cheap-to-clone handle for sending messages to the peer.
#[derive(Clone)]
pub struct OverlaySender {
    tx: mpsc::Sender<Bytes>,
}

impl OverlaySender {
    /// Queue one message for reliable ordered delivery.
    pub async fn send(&self, message: Bytes) -> Result<(), OverlayError> {
        self.tx.send(message).await.map_err(|_| OverlayError::Closed)
    }
}

/// One endpoint's view of the overlay channel.
pub struct OverlayConnection {
    sender: OverlaySender,
    events: mpsc::Receiver<OverlayEvent>,
}

impl OverlayConnection {
    /// Wrap a transport's channel halves.
    ///
    /// `outbound` receives every message the tunnel sends; the transport
    /// drains it toward the peer. `events` is where the transport reports
    /// inbound messages and lifecycle changes.
    pub fn new(outbound: mpsc::Sender<Bytes>, events: mpsc::Receiver<OverlayEvent>) -> Self {
        Self {
            sender: OverlaySender { tx: outbound },
            events,
        }
    }

    /// Clone the outbound handle.
    pub fn sender(&self) -> OverlaySender {
        self.sender.clone()
    }

    /// Next event, or `None` once the transport has dropped its side.
    pub async fn next_event(&mut self) -> Option<OverlayEvent> {
        self.events.recv().await
    }
}
