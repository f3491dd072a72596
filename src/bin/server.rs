//! Peerlink host endpoint
//!
//! Runs on the machine that owns the service being shared. Accepts one
//! overlay link at a time and plays the egress role: the first DATA
//! packet for each new stream id opens a connection to the local service
//! port.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use peerlink::{
    config::{Config, HostConfig},
    overlay,
    tunnel::{Role, TunnelPump, TunnelState},
};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Peerlink host - expose a local TCP service to a remote peer
#[derive(Parser, Debug)]
#[command(name = "peerlink-server")]
#[command(about = "Peerlink host endpoint - expose a local TCP service to a remote peer")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Overlay link listen address (overrides config)
    #[arg(short, long)]
    listen: Option<String>,

    /// Local service port to expose (overrides config)
    #[arg(short, long)]
    target_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(&args.log_level)
        .init();

    let config = Config::load_or_default(&args.config).context("Failed to load configuration")?;
    let host_config = config.host.unwrap_or_default();

    let listen_addr = args.listen.unwrap_or(host_config.listen.clone());
    let target_port = args.target_port.unwrap_or(host_config.target_port);
    if target_port == 0 {
        return Err(anyhow!(
            "No target port configured; pass --target-port or set [host] target_port"
        ));
    }

    info!("Peerlink host v{}", peerlink::VERSION);
    info!("Exposing 127.0.0.1:{} to the remote peer", target_port);
    info!("Waiting for overlay link on {}", listen_addr);

    let listener = TcpListener::bind(&listen_addr)
        .await
        .context("Failed to bind overlay link listener")?;

    loop {
        tokio::select! {
            accepted = overlay::link::accept(&listener) => {
                match accepted {
                    Ok((connection, peer)) => {
                        info!("Peer {} linked up", peer);
                        if !serve_link(connection, &host_config, target_port).await {
                            break;
                        }
                        info!("Waiting for next overlay link on {}", listen_addr);
                    }
                    Err(e) => {
                        error!("Overlay link accept error: {}", e);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    Ok(())
}

/// Run the tunnel for one overlay link until it drops. Returns `false`
/// when the process should shut down instead of awaiting another link.
async fn serve_link(
    connection: overlay::OverlayConnection,
    config: &HostConfig,
    target_port: u16,
) -> bool {
    let state = TunnelState::new(Role::Egress, connection.sender(), target_port);

    let pump = TunnelPump::new(state, connection)
        .ping_interval(Duration::from_secs(config.ping_interval_secs));

    tokio::select! {
        reason = pump.run() => {
            info!("Tunnel ended: {:?}", reason);
            true
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
            false
        }
    }
}
