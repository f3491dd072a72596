//! Per-stream socket tasks
//!
//! Each stream owns its TCP socket through two spawned tasks: a read loop
//! that turns local bytes into DATA packets, and a write loop that drains
//! the stream's queue onto the socket. The tasks hold the socket halves
//! themselves, so in-flight I/O stays valid after the table entry is gone;
//! cancellation drops both halves and that is the one socket close.

use super::state::TunnelState;
use super::table::StreamHandle;
use super::{StreamId, TunnelError, TunnelPacket, READ_BUFFER_SIZE, WRITE_QUEUE_DEPTH};
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Register `socket` under `id` and start its read/write tasks.
///
/// Used by ingress with a freshly generated id and by egress with the id
/// the peer assigned. The caller gets the same handle the table holds.
pub(crate) fn spawn(
    state: &Arc<TunnelState>,
    id: StreamId,
    socket: TcpStream,
) -> Result<StreamHandle, TunnelError> {
    socket.set_nodelay(true)?;
    let (read_half, write_half) = socket.into_split();

    let (write_tx, write_rx) = mpsc::channel::<Bytes>(WRITE_QUEUE_DEPTH);
    let cancel = CancellationToken::new();
    let handle = StreamHandle::new(id, write_tx, cancel.clone());

    state.table().insert(id, handle.clone())?;

    tokio::spawn(read_loop(Arc::clone(state), id, read_half, cancel.clone()));
    tokio::spawn(write_loop(Arc::clone(state), id, write_half, write_rx, cancel));

    Ok(handle)
}

/// Read local socket bytes and emit them as DATA packets.
///
/// EOF and read errors both mean the local end is done: notify the peer
/// once and drop the stream. Cancellation means the stream was removed
/// (peer DISCONNECT, write failure, or tunnel teardown) and must not be
/// resurrected, so that path exits without emitting anything.
async fn read_loop(
    state: Arc<TunnelState>,
    id: StreamId,
    mut read_half: OwnedReadHalf,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = tokio::select! {
            _ = cancel.cancelled() => return,
            result = read_half.read(&mut buf) => match result {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    debug!("stream {} read error: {}", id, e);
                    break;
                }
            },
        };

        // Removed between the read completing and the send: drop the bytes.
        if !state.table().contains(&id) {
            break;
        }

        let packet = TunnelPacket::data(id, Bytes::copy_from_slice(&buf[..n]));
        if state.overlay().send(packet.encode()).await.is_err() {
            // Overlay gone; the pump tears everything down.
            return;
        }
        trace!("stream {} forwarded {} bytes", id, n);
    }

    teardown(&state, id).await;
}

/// Drain queued payloads onto the local socket.
///
/// A write failure tears the stream down exactly like a read failure
/// would. On cancellation the half is shut down gracefully so the local
/// peer sees FIN rather than a reset.
async fn write_loop(
    state: Arc<TunnelState>,
    id: StreamId,
    mut write_half: OwnedWriteHalf,
    mut write_rx: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
) {
    loop {
        let data = tokio::select! {
            _ = cancel.cancelled() => break,
            queued = write_rx.recv() => match queued {
                Some(data) => data,
                None => break,
            },
        };

        if data.is_empty() {
            continue;
        }

        // `data` is owned here until write_all returns, so the bytes
        // cannot be reused or freed mid-write.
        if let Err(e) = write_half.write_all(&data).await {
            debug!("stream {} write error: {}", id, e);
            teardown(&state, id).await;
            return;
        }
    }

    let _ = write_half.shutdown().await;
}

/// Remove the stream and tell the peer, at most once per stream.
///
/// `remove` hands the entry to exactly one caller, so concurrent failure
/// paths (read EOF racing a write error, or either racing an inbound
/// DISCONNECT) cannot double-notify.
async fn teardown(state: &Arc<TunnelState>, id: StreamId) {
    if state.table().remove(&id).is_some() {
        debug!("stream {} closed locally", id);
        let _ = state
            .overlay()
            .send(TunnelPacket::disconnect(id).encode())
            .await;
    }
}
