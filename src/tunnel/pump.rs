//! Tunnel pump - the routing core
//!
//! One task, the sole consumer of overlay events. Inbound messages are
//! decoded and dispatched by packet type; a periodic timer probes the
//! peer for round-trip timing. When the overlay reports closed, every
//! stream is torn down and the pump returns.

use super::state::TunnelState;
use super::{egress, liveness, PacketType, TunnelPacket, PING_ID};
use crate::overlay::{OverlayConnection, OverlayEvent};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

/// Why the pump stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disconnected {
    /// The peer closed the overlay channel.
    ByPeer(String),
    /// The channel failed on this side.
    LocalProblem(String),
}

/// The tunnel's dispatch loop.
pub struct TunnelPump {
    state: Arc<TunnelState>,
    overlay: OverlayConnection,
    ping_interval: Duration,
}

impl TunnelPump {
    pub fn new(state: Arc<TunnelState>, overlay: OverlayConnection) -> Self {
        Self {
            state,
            overlay,
            ping_interval: liveness::DEFAULT_PING_INTERVAL,
        }
    }

    /// Override the probe cadence.
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Run until the overlay closes. All streams are gone by the time
    /// this returns.
    pub async fn run(mut self) -> Disconnected {
        let start = tokio::time::Instant::now() + self.ping_interval;
        let mut ping_timer = tokio::time::interval_at(start, self.ping_interval);
        ping_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let reason = loop {
            tokio::select! {
                _ = ping_timer.tick() => {
                    self.send_ping().await;
                }
                event = self.overlay.next_event() => match event {
                    Some(OverlayEvent::Connected) => {
                        info!("overlay channel connected");
                    }
                    Some(OverlayEvent::Message(raw)) => {
                        self.dispatch(raw).await;
                    }
                    Some(OverlayEvent::ClosedByPeer(reason)) => {
                        info!("overlay closed by peer: {}", reason);
                        break Disconnected::ByPeer(reason);
                    }
                    Some(OverlayEvent::LocalProblem(reason)) => {
                        warn!("overlay failed locally: {}", reason);
                        break Disconnected::LocalProblem(reason);
                    }
                    None => {
                        break Disconnected::LocalProblem("overlay adapter dropped".to_string());
                    }
                },
            }
        };

        self.state.table().close_all();
        reason
    }

    /// Decode and route one overlay message. Malformed input is logged
    /// and dropped; it never stops the pump or touches other streams.
    async fn dispatch(&self, raw: Bytes) {
        let packet = match TunnelPacket::decode(raw) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("discarding malformed tunnel message: {}", e);
                return;
            }
        };

        match packet.kind {
            PacketType::Data => self.handle_data(packet).await,
            PacketType::Disconnect => {
                if self.state.table().remove(&packet.id).is_some() {
                    debug!("stream {} disconnected by peer", packet.id);
                }
            }
            PacketType::Ping => {
                let pong = TunnelPacket::pong(packet.id, packet.payload);
                let _ = self.state.overlay().send(pong.encode()).await;
            }
            PacketType::Pong => {
                if let Some(rtt) = liveness::rtt_from_token(&packet.payload) {
                    trace!("tunnel rtt {} ms", rtt.as_millis());
                    self.state.publish_rtt(rtt);
                }
            }
        }
    }

    /// Route DATA to its stream, lazily opening the egress connection for
    /// ids this endpoint has not seen yet.
    async fn handle_data(&self, packet: TunnelPacket) {
        let id = packet.id;

        if let Some(handle) = self.state.table().get(&id) {
            if handle.write(packet.payload).await.is_err() {
                // Write task already gone; removal is in progress.
                trace!("dropping data for closing stream {}", id);
            }
            return;
        }

        if self.state.role().accepts_egress() && self.state.target_port() > 0 {
            match egress::open(&self.state, id).await {
                Ok(handle) => {
                    if handle.write(packet.payload).await.is_err() {
                        trace!("stream {} closed before first write", id);
                    }
                }
                Err(e) => {
                    // Drop this packet only; the next DATA for the id
                    // retries the connect.
                    warn!(
                        "stream {}: local service on port {} unreachable: {}",
                        id,
                        self.state.target_port(),
                        e
                    );
                }
            }
        } else {
            debug!("no stream for id {}, dropping {} bytes", id, packet.payload.len());
        }
    }

    /// Probe the peer. A lost probe only leaves the RTT stale; the
    /// overlay's own keepalive decides liveness.
    async fn send_ping(&self) {
        let token = Bytes::copy_from_slice(&liveness::clock_token());
        let ping = TunnelPacket::ping(PING_ID, token);
        if self.state.overlay().send(ping.encode()).await.is_err() {
            debug!("ping skipped, overlay closed");
        }
    }
}
