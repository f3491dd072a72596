//! Local TCP ingress
//!
//! Listens on the configured local port and inducts every accepted
//! connection as a tunneled stream with a freshly generated id. The
//! remote egress side mirrors the id on its first DATA packet, so nothing
//! is negotiated up front.

use super::state::TunnelState;
use super::stream;
use super::table::StreamTable;
use super::{StreamId, TunnelError, ID_RETRY_LIMIT};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket};
use tracing::{debug, info, warn};

/// Listen backlog for the ingress socket.
const LISTEN_BACKLOG: u32 = 1024;

/// Accept local TCP clients on `0.0.0.0:port` until the listener fails or
/// the task is dropped.
///
/// Runs alongside the pump; tearing down the tunnel closes all inducted
/// streams but the listener itself only stops with its task.
pub async fn run_ingress(state: Arc<TunnelState>, port: u16) -> Result<(), TunnelError> {
    let listener = bind_ingress(port)?;
    serve_ingress(state, listener).await
}

/// Bind the ingress listener with `SO_REUSEADDR` so a restarted endpoint
/// can reclaim the port immediately. Port 0 picks an ephemeral port;
/// read it back with `local_addr`.
pub fn bind_ingress(port: u16) -> Result<TcpListener, TunnelError> {
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))?;
    Ok(socket.listen(LISTEN_BACKLOG)?)
}

/// Accept loop over an already-bound listener.
pub async fn serve_ingress(state: Arc<TunnelState>, listener: TcpListener) -> Result<(), TunnelError> {
    if let Ok(addr) = listener.local_addr() {
        info!("tunnel ingress listening on {}", addr);
    }

    loop {
        let (socket, peer) = listener.accept().await?;
        match induct(&state, socket) {
            Ok(id) => debug!("accepted local client {} as stream {}", peer, id),
            Err(e) => warn!("refused local client {}: {}", peer, e),
        }
    }
}

/// Assign a fresh id to an accepted socket and start its stream tasks.
fn induct(state: &Arc<TunnelState>, socket: tokio::net::TcpStream) -> Result<StreamId, TunnelError> {
    let id = fresh_id(state.table())?;
    stream::spawn(state, id, socket)?;
    Ok(id)
}

/// Draw an id not currently in the table, re-drawing on collision up to a
/// small bound.
fn fresh_id(table: &StreamTable) -> Result<StreamId, TunnelError> {
    for _ in 0..ID_RETRY_LIMIT {
        let id = StreamId::generate();
        if !table.contains(&id) {
            return Ok(id);
        }
    }
    Err(TunnelError::IdExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tunnel::table::StreamHandle;
    use bytes::Bytes;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn occupy(table: &StreamTable, id: StreamId) {
        let (tx, rx) = mpsc::channel::<Bytes>(1);
        std::mem::drop(rx);
        table
            .insert(id, StreamHandle::new(id, tx, CancellationToken::new()))
            .unwrap();
    }

    #[test]
    fn test_fresh_id_avoids_occupied() {
        let table = StreamTable::new();
        let taken = StreamId::generate();
        occupy(&table, taken);

        for _ in 0..64 {
            let id = fresh_id(&table).unwrap();
            assert_ne!(id, taken);
        }
    }
}
