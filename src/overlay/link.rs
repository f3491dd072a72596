//! Direct TCP overlay link
//!
//! Carries overlay messages over one TCP connection as `u32`
//! little-endian length-prefixed frames. This is the channel the shipped
//! binaries use; it satisfies the overlay contract whenever the two peers
//! can reach each other directly (LAN, VPN, port forward). A
//! NAT-traversing transport replaces this module, not the tunnel.

use super::{OverlayConnection, OverlayError, OverlayEvent, CHANNEL_DEPTH, MAX_MESSAGE_SIZE};
use bytes::Bytes;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Length prefix size in bytes.
const LENGTH_PREFIX_LEN: usize = 4;

/// Connect the link to a listening peer.
pub async fn connect(addr: &str) -> Result<OverlayConnection, OverlayError> {
    let stream = TcpStream::connect(addr).await?;
    debug!("overlay link connected to {}", addr);
    Ok(spawn_link(stream))
}

/// Accept one link connection from a peer.
pub async fn accept(listener: &TcpListener) -> Result<(OverlayConnection, SocketAddr), OverlayError> {
    let (stream, peer) = listener.accept().await?;
    debug!("overlay link accepted from {}", peer);
    Ok((spawn_link(stream), peer))
}

/// Wrap an established TCP connection as an overlay channel.
///
/// Spawns a reader task and a writer task; both report through the event
/// channel only, so the pump stays the single consumer of link state.
pub fn spawn_link(stream: TcpStream) -> OverlayConnection {
    stream.set_nodelay(true).ok();
    let (read_half, write_half) = stream.into_split();

    let (outbound_tx, outbound_rx) = mpsc::channel::<Bytes>(CHANNEL_DEPTH);
    let (event_tx, event_rx) = mpsc::channel::<OverlayEvent>(CHANNEL_DEPTH);

    let reader_events = event_tx.clone();
    tokio::spawn(async move {
        let _ = reader_events.send(OverlayEvent::Connected).await;
        let event = match read_messages(read_half, &reader_events).await {
            Ok(()) => OverlayEvent::ClosedByPeer("connection closed".to_string()),
            Err(OverlayError::MessageTooLarge(n)) => {
                OverlayEvent::LocalProblem(format!("inbound message of {} bytes exceeds limit", n))
            }
            Err(e) => OverlayEvent::LocalProblem(e.to_string()),
        };
        let _ = reader_events.send(event).await;
    });

    tokio::spawn(async move {
        if let Err(e) = write_messages(write_half, outbound_rx).await {
            let _ = event_tx
                .send(OverlayEvent::LocalProblem(format!("link write failed: {}", e)))
                .await;
        }
    });

    OverlayConnection::new(outbound_tx, event_rx)
}

/// Read length-prefixed messages until EOF or error.
async fn read_messages(
    mut read_half: OwnedReadHalf,
    events: &mpsc::Sender<OverlayEvent>,
) -> Result<(), OverlayError> {
    let mut len_buf = [0u8; LENGTH_PREFIX_LEN];
    loop {
        match read_half.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(OverlayError::MessageTooLarge(len));
        }

        let mut body = vec![0u8; len];
        read_half.read_exact(&mut body).await?;
        trace!("link received {} byte message", len);

        if events
            .send(OverlayEvent::Message(Bytes::from(body)))
            .await
            .is_err()
        {
            // Pump is gone; stop reading.
            return Ok(());
        }
    }
}

/// Drain the outbound queue onto the socket.
async fn write_messages(
    mut write_half: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Bytes>,
) -> Result<(), OverlayError> {
    while let Some(message) = outbound.recv().await {
        // Coalesce prefix + body into one write to halve syscall overhead
        let mut wire = Vec::with_capacity(LENGTH_PREFIX_LEN + message.len());
        wire.extend_from_slice(&(message.len() as u32).to_le_bytes());
        wire.extend_from_slice(&message);
        write_half.write_all(&wire).await?;
    }
    let _ = write_half.shutdown().await;
    Ok(())
}
