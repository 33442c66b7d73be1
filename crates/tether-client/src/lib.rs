//! # tether-client
//!
//! Tokio client side of the tether channel:
//!
//! - [`ChannelClient`]: background driver with reconnect, heartbeats, and
//!   pong suppression; exposes connection state and a [`RetryGate`] seam,
//!   nothing more
//! - [`ResilientChannel`]: escalation layered on top of the client,
//!   switching to the sticky HTTP polling fallback after repeated dial
//!   failures
//! - [`FallbackTransport`] / [`EscalationPolicy`]: the fallback pieces
//! - [`ClientConfig`]: endpoint and policy knobs
//!
//! The reconnect policy lives in `tether_core::backoff` so both sides of the
//! channel share one definition.

#![deny(unsafe_code)]

pub mod channel;
pub mod config;
pub mod error;
pub mod fallback;
pub mod resilient;
pub mod state;

pub use channel::{ChannelClient, RetryGate};
pub use config::ClientConfig;
pub use error::ClientError;
pub use fallback::{EscalationPolicy, FallbackResponse, FallbackTransport};
pub use resilient::ResilientChannel;
pub use state::{ChannelMode, ConnectionStatus};
