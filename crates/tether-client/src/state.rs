//! Observable client state.

use serde::Serialize;

/// The connection lifecycle as seen by the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionStatus {
    /// A transport attempt is in flight (initial connect or reconnect).
    Connecting,
    /// The channel is open and usable.
    Connected,
    /// No transport. Either waiting out a backoff delay or terminal
    /// (attempt budget exhausted / escalated to fallback / closed).
    Disconnected,
}

/// How the client is currently reaching the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelMode {
    /// Live WebSocket channel.
    Direct,
    /// Between transports, retrying with backoff.
    Reconnecting,
    /// Escalated to HTTP polling. Sticky: the channel stays here until the
    /// application explicitly reconnects.
    Fallback,
}
