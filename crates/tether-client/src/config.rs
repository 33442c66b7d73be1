//! Client configuration.

use serde::{Deserialize, Serialize};

use tether_core::ReconnectConfig;

/// Default heartbeat interval in milliseconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 20_000;
/// Default number of consecutive transport failures before escalating to
/// the HTTP polling fallback.
pub const DEFAULT_FALLBACK_AFTER_FAILURES: u32 = 2;

/// Configuration for a [`ChannelClient`].
///
/// [`ChannelClient`]: crate::ChannelClient
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://127.0.0.1:9100/ws`.
    pub url: String,
    /// HTTP fallback endpoint, e.g. `http://127.0.0.1:9100/api/action`.
    /// Read by the fallback layer, not the core client. `None` disables
    /// escalation: the channel goes terminally disconnected instead of
    /// falling back.
    #[serde(default)]
    pub fallback_url: Option<String>,
    /// Interval between heartbeat pings while connected (default: 20s).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Consecutive transport failures before escalating to the fallback
    /// (default: 2).
    #[serde(default = "default_fallback_after_failures")]
    pub fallback_after_failures: u32,
    /// Reconnect backoff policy.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

fn default_heartbeat_interval_ms() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_MS
}

fn default_fallback_after_failures() -> u32 {
    DEFAULT_FALLBACK_AFTER_FAILURES
}

impl ClientConfig {
    /// Config for a WebSocket endpoint with default policies and no
    /// fallback.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fallback_url: None,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            fallback_after_failures: DEFAULT_FALLBACK_AFTER_FAILURES,
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Set the HTTP fallback endpoint.
    #[must_use]
    pub fn with_fallback(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = Some(url.into());
        self
    }

    /// Set the reconnect policy.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::new("ws://localhost:9100/ws");
        assert_eq!(config.heartbeat_interval_ms, 20_000);
        assert_eq!(config.fallback_after_failures, 2);
        assert_eq!(config.reconnect.max_attempts, 5);
        assert!(config.fallback_url.is_none());
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"url":"ws://h/ws","heartbeatIntervalMs":5000}"#).unwrap();
        assert_eq!(config.url, "ws://h/ws");
        assert_eq!(config.heartbeat_interval_ms, 5000);
        assert_eq!(config.fallback_after_failures, 2);
    }

    #[test]
    fn builder_sets_fallback() {
        let config = ClientConfig::new("ws://h/ws").with_fallback("http://h/api/action");
        assert_eq!(config.fallback_url.as_deref(), Some("http://h/api/action"));
    }
}
