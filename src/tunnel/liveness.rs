//! Liveness probe tokens
//!
//! A PING carries an 8-byte sample of this process's monotonic clock; the
//! peer echoes it verbatim in a PONG and the difference to "now" is the
//! tunnel round-trip time. Tokens are opaque to the peer, so clocks never
//! need to agree across machines.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Probe token length in bytes.
pub const TOKEN_LEN: usize = 8;

/// How often the pump probes the peer.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(5);

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Sample the monotonic clock as a little-endian token.
pub fn clock_token() -> [u8; TOKEN_LEN] {
    let nanos = epoch().elapsed().as_nanos() as u64;
    nanos.to_le_bytes()
}

/// Recover the round-trip time from an echoed token.
///
/// Returns `None` for tokens we cannot have produced (wrong length or a
/// timestamp from the future), so a confused peer only leaves the RTT
/// stale.
pub fn rtt_from_token(payload: &[u8]) -> Option<Duration> {
    let bytes: [u8; TOKEN_LEN] = payload.get(..TOKEN_LEN)?.try_into().ok()?;
    let sent_nanos = u64::from_le_bytes(bytes);
    let now_nanos = epoch().elapsed().as_nanos() as u64;
    now_nanos.checked_sub(sent_nanos).map(Duration::from_nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let token = clock_token();
        let rtt = rtt_from_token(&token).expect("fresh token must decode");
        assert!(rtt < Duration::from_secs(1));
    }

    #[test]
    fn test_short_token_rejected() {
        assert!(rtt_from_token(&[]).is_none());
        assert!(rtt_from_token(&[1, 2, 3]).is_none());
    }

    #[test]
    fn test_future_token_rejected() {
        let future = (epoch().elapsed().as_nanos() as u64 + 1_000_000_000).to_le_bytes();
        assert!(rtt_from_token(&future).is_none());
    }

    #[test]
    fn test_rtt_is_monotone_in_elapsed_time() {
        let token = clock_token();
        std::thread::sleep(Duration::from_millis(5));
        let rtt = rtt_from_token(&token).unwrap();
        assert!(rtt >= Duration::from_millis(5));
    }
}
