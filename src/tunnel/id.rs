//! Stream identifiers
//!
//! Every tunneled stream is named by a compact 6-character token drawn from
//! a 64-symbol alphabet (the nanoid dictionary). Ids are assigned by the
//! ingress endpoint and mirrored by the egress endpoint, so both tables key
//! the same stream by the same bytes.

use rand::Rng;
use std::fmt;

/// Length of a stream id in bytes.
pub const ID_LEN: usize = 6;

/// The 64-symbol id alphabet.
pub const ID_ALPHABET: &[u8; 64] =
    b"_-0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Reserved id carried by liveness probes. PING/PONG handlers ignore the
/// id, so this token never enters the stream table.
pub const PING_ID: StreamId = StreamId(*b"__ping");

/// A 6-byte stream identifier.
///
/// Generated ids always come from [`ID_ALPHABET`]; ids parsed off the wire
/// are accepted as-is so a foreign peer cannot poison the decode path.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId([u8; ID_LEN]);

impl StreamId {
    /// Draw a fresh random id.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; ID_LEN];
        for b in &mut bytes {
            *b = ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())];
        }
        Self(bytes)
    }

    /// Read an id from the first [`ID_LEN`] bytes of a wire message.
    ///
    /// The caller guarantees `bytes` is long enough; the NUL terminator at
    /// offset 6 is not part of the id.
    pub(crate) fn from_wire(bytes: &[u8]) -> Self {
        let mut id = [0u8; ID_LEN];
        id.copy_from_slice(&bytes[..ID_LEN]);
        Self(id)
    }

    /// Raw id bytes.
    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    /// Whether every byte comes from [`ID_ALPHABET`].
    pub fn is_well_formed(&self) -> bool {
        self.0.iter().all(|b| ID_ALPHABET.contains(b))
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{}", b.escape_ascii())?;
        }
        Ok(())
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", self)
    }
}

impl From<[u8; ID_LEN]> for StreamId {
    fn from(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_are_well_formed() {
        for _ in 0..256 {
            let id = StreamId::generate();
            assert!(id.is_well_formed());
            assert_eq!(id.as_bytes().len(), ID_LEN);
        }
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        // 2^36 possible ids; 64 draws colliding would mean a broken RNG.
        let ids: HashSet<StreamId> = (0..64).map(|_| StreamId::generate()).collect();
        assert_eq!(ids.len(), 64);
    }

    #[test]
    fn test_wire_roundtrip() {
        let id = StreamId::from(*b"ab12_-");
        let parsed = StreamId::from_wire(id.as_bytes());
        assert_eq!(id, parsed);
        assert_eq!(id.to_string(), "ab12_-");
    }

    #[test]
    fn test_ping_id_shape() {
        assert_eq!(PING_ID.as_bytes(), b"__ping");
        assert!(PING_ID.is_well_formed());
    }
}
