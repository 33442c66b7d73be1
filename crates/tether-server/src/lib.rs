//! # tether-server
//!
//! Server side of the tether channel.
//!
//! - Connection registry: membership set with unicast/broadcast delivery
//! - Dispatch: ping/pong heartbeat, malformed-frame isolation, application
//!   handler invocation at the dispatch boundary
//! - Liveness sweep: periodic reaping of half-dead sockets
//! - Axum bootstrap: `/ws` upgrade, `/health`, and the `POST /api/action`
//!   HTTP polling fallback
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod health;
pub mod registry;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod sweep;

pub use config::ServerConfig;
pub use connection::{Connection, ConnectionState};
pub use error::ServerError;
pub use registry::Registry;
pub use server::ChannelServer;
pub use shutdown::ShutdownCoordinator;
