//! # Peerlink
//!
//! Tunnels arbitrary TCP byte streams between two peers over a single
//! reliable, ordered, message-oriented channel (the *overlay*). One side
//! accepts local TCP clients and the other opens connections to a local
//! service, so a server bound to `127.0.0.1` on one machine becomes
//! reachable through a local port on the other.
//!
//! ## Architecture
//!
//! ```text
//! local TCP client                                local TCP service
//!       │                                                ▲
//!       ▼                                                │
//! ┌──────────────┐   DATA / DISCONNECT / PING    ┌──────────────┐
//! │   Ingress    │ ────────────────────────────► │    Egress    │
//! │ (listener +  │        tunnel packets         │ (lazy opens  │
//! │  stream ids) │ ◄──────────────────────────── │  per id)     │
//! └──────────────┘      one overlay channel      └──────────────┘
//! ```
//!
//! The overlay itself (NAT traversal, relays, peer identity) is external;
//! the crate consumes it through [`overlay::OverlayConnection`], which any
//! transport can produce. A direct TCP link ([`overlay::link`]) and an
//! in-process pair ([`overlay::memory`]) ship with the crate.

pub mod config;
pub mod overlay;
pub mod tunnel;

pub use config::Config;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default local port the ingress endpoint listens on.
pub const DEFAULT_INGRESS_PORT: u16 = 8888;

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Overlay error: {0}")]
    Overlay(#[from] overlay::OverlayError),

    #[error("Tunnel error: {0}")]
    Tunnel(#[from] tunnel::TunnelError),

    #[error("Configuration error: {0}")]
    Config(String),
}
