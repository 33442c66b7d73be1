//! # tether-demo
//!
//! Min/max pair finder served over the tether channel. Clients connect to
//! `/ws`, send `{"type":"array","data":[...]}`, and every live member
//! receives the computed result as an `update` broadcast. The same actions
//! are reachable over `POST /api/action` for clients that fell back to HTTP
//! polling.

#![deny(unsafe_code)]

mod handler;
mod pairs;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tether_server::{ChannelServer, ServerConfig};

use crate::handler::PairFinderHandler;

/// Pair finder channel server.
#[derive(Parser, Debug)]
#[command(name = "tether-demo", about = "Min/max pair finder channel server")]
struct Cli {
    /// Host to bind (overrides config file).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides config file).
    #[arg(long)]
    port: Option<u16>,

    /// Path to a JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load server config")?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let server = ChannelServer::new(config, Arc::new(PairFinderHandler::new()));
    server.shutdown().listen_for_ctrl_c();

    let listener = server.bind().await.context("Failed to bind listener")?;
    server.serve(listener).await.context("Server error")?;
    Ok(())
}
