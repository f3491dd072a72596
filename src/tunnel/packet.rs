//! Packet encoding/decoding for the tunnel protocol
//!
//! Packet format (framing is the overlay's message boundary, so there is
//! no in-band length field):
//!
//! ```text
//! +-----------------------------+--------+---------------------+
//! |      Stream ID (6B)         |  NUL   |  Type (u32, LE)     |
//! +-----------------------------+--------+---------------------+
//! |                        Payload                             |
//! +------------------------------------------------------------+
//! ```

use super::{StreamId, TunnelError, ID_LEN};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Fixed header size: 6 id bytes, one NUL, four type bytes.
pub const PACKET_HEADER_LEN: usize = ID_LEN + 1 + 4;

/// Packet types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PacketType {
    /// Stream bytes
    Data = 0,
    /// Stream teardown, empty payload
    Disconnect = 1,
    /// Liveness probe carrying an opaque clock token
    Ping = 2,
    /// Echo of a PING token
    Pong = 3,
}

impl TryFrom<u32> for PacketType {
    type Error = TunnelError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketType::Data),
            1 => Ok(PacketType::Disconnect),
            2 => Ok(PacketType::Ping),
            3 => Ok(PacketType::Pong),
            other => Err(TunnelError::UnknownPacketType(other)),
        }
    }
}

/// One framed unit on the overlay channel.
#[derive(Debug, Clone)]
pub struct TunnelPacket {
    /// Stream the packet belongs to
    pub id: StreamId,
    /// Packet type
    pub kind: PacketType,
    /// Payload bytes (stream data, or the probe token for PING/PONG)
    pub payload: Bytes,
}

impl TunnelPacket {
    /// Create a data packet.
    pub fn data(id: StreamId, payload: Bytes) -> Self {
        Self {
            id,
            kind: PacketType::Data,
            payload,
        }
    }

    /// Create a disconnect packet.
    pub fn disconnect(id: StreamId) -> Self {
        Self {
            id,
            kind: PacketType::Disconnect,
            payload: Bytes::new(),
        }
    }

    /// Create a ping packet carrying an opaque probe token.
    pub fn ping(id: StreamId, token: Bytes) -> Self {
        Self {
            id,
            kind: PacketType::Ping,
            payload: token,
        }
    }

    /// Create a pong packet echoing a probe token.
    pub fn pong(id: StreamId, token: Bytes) -> Self {
        Self {
            id,
            kind: PacketType::Pong,
            payload: token,
        }
    }

    /// Encode into one contiguous overlay message.
    ///
    /// The type field is written little-endian regardless of host byte
    /// order so two endpoints on different architectures interoperate.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(PACKET_HEADER_LEN + self.payload.len());
        buf.put_slice(self.id.as_bytes());
        buf.put_u8(0);
        buf.put_u32_le(self.kind as u32);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Decode one overlay message.
    ///
    /// Anything shorter than the 11-byte header or carrying an unknown
    /// type code is malformed. The payload is the remainder of the
    /// message, zero-copy out of `raw`.
    pub fn decode(mut raw: Bytes) -> Result<Self, TunnelError> {
        if raw.len() < PACKET_HEADER_LEN {
            return Err(TunnelError::Truncated(raw.len()));
        }

        let id = StreamId::from_wire(&raw[..ID_LEN]);
        raw.advance(ID_LEN + 1); // id + NUL terminator
        let kind = PacketType::try_from(raw.get_u32_le())?;

        Ok(Self {
            id,
            kind,
            payload: raw,
        })
    }

    /// Total encoded size of this packet.
    pub fn encoded_len(&self) -> usize {
        PACKET_HEADER_LEN + self.payload.len()
    }
}
