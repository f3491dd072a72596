//! Peerlink joining endpoint
//!
//! Runs on the machine that wants to use the remote service. Connects the
//! overlay link to the host and plays the ingress role: a local listener
//! accepts TCP clients and every accepted connection becomes a tunneled
//! stream.

use anyhow::{Context, Result};
use clap::Parser;
use peerlink::{
    config::Config,
    overlay,
    tunnel::{self, Role, TunnelPump, TunnelState},
};
use std::time::Duration;
use tracing::{error, info};

/// Peerlink client - reach a peer's TCP service through a local port
#[derive(Parser, Debug)]
#[command(name = "peerlink-client")]
#[command(about = "Peerlink joining endpoint - reach a peer's TCP service through a local port")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Host overlay link address (overrides config)
    #[arg(short, long)]
    server: Option<String>,

    /// Local port offered to TCP clients (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

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
    let client_config = config.client.unwrap_or_default();

    let server_addr = args.server.unwrap_or(client_config.server);
    let ingress_port = args.port.unwrap_or(client_config.ingress_port);

    info!("Peerlink client v{}", peerlink::VERSION);
    info!("Linking to host at {}", server_addr);

    let connection = overlay::link::connect(&server_addr)
        .await
        .context("Failed to connect overlay link")?;

    let state = TunnelState::new(Role::Ingress, connection.sender(), 0);

    let ingress = tokio::spawn(tunnel::run_ingress(state.clone(), ingress_port));
    info!(
        "Local clients can now connect to 127.0.0.1:{}",
        ingress_port
    );

    let pump = TunnelPump::new(state, connection)
        .ping_interval(Duration::from_secs(client_config.ping_interval_secs));

    tokio::select! {
        reason = pump.run() => {
            error!("Tunnel ended: {:?}", reason);
        }
        result = ingress => {
            match result {
                Ok(Err(e)) => error!("Ingress listener failed: {}", e),
                Ok(Ok(())) => {}
                Err(e) => error!("Ingress task panicked: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    Ok(())
}
