//! Tunnel layer - multiplexed TCP streams over one overlay channel
//!
//! Provides:
//! - Packet encoding/decoding
//! - The stream table (id -> socket registry)
//! - Ingress (local listener) and egress (lazy connect) endpoints
//! - The pump: dispatch loop plus periodic liveness probes

mod egress;
mod id;
mod ingress;
mod liveness;
mod packet;
mod pump;
mod state;
mod stream;
mod table;

pub use id::{StreamId, ID_ALPHABET, ID_LEN, PING_ID};
pub use liveness::{clock_token, rtt_from_token, DEFAULT_PING_INTERVAL, TOKEN_LEN};
pub use packet::{PacketType, TunnelPacket, PACKET_HEADER_LEN};
pub use pump::{Disconnected, TunnelPump};
pub use state::{Role, TunnelState};
pub use table::{StreamHandle, StreamTable};

pub use ingress::{bind_ingress, run_ingress, serve_ingress};

use thiserror::Error;

/// Tunnel layer errors
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("Truncated packet: {0} bytes, need at least {PACKET_HEADER_LEN}")]
    Truncated(usize),

    #[error("Unknown packet type: {0}")]
    UnknownPacketType(u32),

    #[error("Stream id already in use: {0}")]
    IdCollision(StreamId),

    #[error("Could not generate an unused stream id")]
    IdExhausted,

    #[error("Stream closed: {0}")]
    StreamClosed(StreamId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capacity of each stream's read buffer; also the largest DATA payload.
pub const READ_BUFFER_SIZE: usize = 131_072;

/// Largest message the tunnel ever puts on the overlay.
pub const MAX_PACKET_SIZE: usize = PACKET_HEADER_LEN + READ_BUFFER_SIZE;

/// Depth of each stream's write queue (packets, not bytes).
pub(crate) const WRITE_QUEUE_DEPTH: usize = 256;

/// How many times ingress re-draws a colliding stream id before refusing
/// the accepted connection.
pub(crate) const ID_RETRY_LIMIT: usize = 8;
