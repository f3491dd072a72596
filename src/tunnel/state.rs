//! Per-endpoint tunnel state

use super::table::StreamTable;
use crate::overlay::OverlaySender;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Which side(s) of the tunnel this endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Accepts local TCP clients and assigns stream ids.
    Ingress,
    /// Opens connections to the local service for peer-assigned ids.
    Egress,
    /// Both at once (each direction keeps its own streams).
    Both,
}

impl Role {
    /// Whether DATA for an unknown id may lazily open a local connection.
    pub fn accepts_egress(&self) -> bool {
        matches!(self, Role::Egress | Role::Both)
    }
}

/// Shared state for one endpoint of the tunnel.
///
/// The stream table is the only cross-task mutable data; everything else
/// here is read-only after construction except the RTT sample, which the
/// pump publishes through a watch channel.
pub struct TunnelState {
    role: Role,
    table: StreamTable,
    overlay: OverlaySender,
    target_port: u16,
    rtt_tx: watch::Sender<Option<Duration>>,
}

impl TunnelState {
    /// Build the endpoint state.
    ///
    /// `target_port` is the local service the egress side connects to;
    /// zero means unconfigured and DATA for unknown ids is dropped.
    pub fn new(role: Role, overlay: OverlaySender, target_port: u16) -> Arc<Self> {
        let (rtt_tx, _) = watch::channel(None);
        Arc::new(Self {
            role,
            table: StreamTable::new(),
            overlay,
            target_port,
            rtt_tx,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn table(&self) -> &StreamTable {
        &self.table
    }

    pub fn overlay(&self) -> &OverlaySender {
        &self.overlay
    }

    /// Local service port for lazy egress opens (0 = unconfigured).
    pub fn target_port(&self) -> u16 {
        self.target_port
    }

    /// Most recent round-trip time measured over the tunnel.
    pub fn latest_rtt(&self) -> Option<Duration> {
        *self.rtt_tx.borrow()
    }

    /// Watch RTT updates as the pump publishes them.
    pub fn subscribe_rtt(&self) -> watch::Receiver<Option<Duration>> {
        self.rtt_tx.subscribe()
    }

    pub(crate) fn publish_rtt(&self, rtt: Duration) {
        self.rtt_tx.send_replace(Some(rtt));
    }
}
