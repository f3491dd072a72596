//! Local TCP egress
//!
//! The host-side endpoint never pre-opens anything: the first DATA packet
//! for an unknown id is what creates the connection to the local service.
//! A failed connect just drops that packet; the next DATA for the same id
//! retries from scratch.

use super::state::TunnelState;
use super::stream;
use super::table::StreamHandle;
use super::{StreamId, TunnelError};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::info;

/// Connect to the configured local service and bind the connection to the
/// peer-assigned `id`.
pub(crate) async fn open(
    state: &Arc<TunnelState>,
    id: StreamId,
) -> Result<StreamHandle, TunnelError> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, state.target_port()));
    let socket = TcpStream::connect(addr).await?;
    info!("stream {} connected to local service at {}", id, addr);

    stream::spawn(state, id, socket)
}
