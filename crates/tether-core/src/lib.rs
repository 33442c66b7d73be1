//! # tether-core
//!
//! Shared building blocks for the tether channel:
//!
//! - [`Envelope`]: the `{type, data}` wire unit exchanged over the channel
//! - [`Handler`]: the application collaborator invoked by the server registry
//! - [`backoff`]: capped exponential backoff with jitter for reconnection
//! - [`ConnectionId`]: time-ordered connection identity
//!
//! The channel layer owns the reserved `ping`/`pong` envelope types; every
//! other type passes through opaquely.

#![deny(unsafe_code)]

pub mod backoff;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod ids;

pub use backoff::ReconnectConfig;
pub use envelope::{Envelope, Outbound, Target};
pub use error::{HandlerError, ProtocolError};
pub use handler::Handler;
pub use ids::ConnectionId;
