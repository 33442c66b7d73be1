//! Fallback escalation, layered on top of the channel client.
//!
//! [`ChannelClient`] only exposes connection state; it never decides to
//! abandon the WebSocket. [`ResilientChannel`] supplies an
//! [`EscalationPolicy`] as the driver's retry gate and, once the policy
//! trips, routes actions through the HTTP [`FallbackTransport`] instead.
//! Escalation is sticky: the channel stays on HTTP until the application
//! calls [`ResilientChannel::connect`] again.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::warn;

use tether_core::Envelope;

use crate::channel::ChannelClient;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::fallback::{EscalationPolicy, FallbackTransport};
use crate::state::{ChannelMode, ConnectionStatus};

/// A [`ChannelClient`] paired with the escalation policy and HTTP fallback.
///
/// [`connect`] is idempotent and clears escalation; [`send`] is
/// fire-and-forget over the live transport; [`submit`] additionally routes
/// through the HTTP fallback once escalated.
///
/// [`connect`]: ResilientChannel::connect
/// [`send`]: ResilientChannel::send
/// [`submit`]: ResilientChannel::submit
pub struct ResilientChannel {
    client: ChannelClient,
    policy: Arc<EscalationPolicy>,
    fallback: Option<FallbackTransport>,
}

impl ResilientChannel {
    /// Create the channel and the receiver on which application envelopes
    /// arrive. Without a `fallback_url` the policy never escalates and the
    /// channel behaves exactly like a bare [`ChannelClient`].
    pub fn new(config: ClientConfig) -> (Self, mpsc::Receiver<Envelope>) {
        let fallback = config.fallback_url.as_deref().map(FallbackTransport::new);
        let threshold = if fallback.is_some() {
            config.fallback_after_failures
        } else {
            0
        };
        let policy = Arc::new(EscalationPolicy::new(threshold));
        let (client, inbound_rx) = ChannelClient::with_gate(config, policy.clone());
        (
            Self {
                client,
                policy,
                fallback,
            },
            inbound_rx,
        )
    }

    /// Start (or restart) the underlying driver, clearing any escalation.
    pub fn connect(&self) {
        self.policy.reset();
        self.client.connect();
    }

    /// Tear down the transport and stop reconnecting.
    pub fn close(&self) {
        self.client.close();
    }

    /// Send an envelope over the live WebSocket.
    ///
    /// Returns `false` once escalated (route through
    /// [`ResilientChannel::submit`] instead) or when no transport is up.
    pub fn send(&self, envelope: &Envelope) -> bool {
        if self.policy.is_escalated() {
            warn!(kind = %envelope.kind, "send dropped: channel escalated to fallback");
            return false;
        }
        self.client.send(envelope)
    }

    /// Send an envelope over whichever transport is available.
    ///
    /// Over the live WebSocket this is fire-and-forget (`Ok(None)`); once
    /// escalated, the envelope is posted to the HTTP fallback and the
    /// action's result payload is returned.
    pub async fn submit(&self, envelope: &Envelope) -> Result<Option<Value>, ClientError> {
        if self.policy.is_escalated() {
            if let Some(fallback) = &self.fallback {
                return fallback.send(envelope).await;
            }
            return Err(ClientError::NoFallback);
        }
        if self.client.status() == ConnectionStatus::Connected && self.client.send(envelope) {
            return Ok(None);
        }
        Err(ClientError::NoFallback)
    }

    /// How the channel currently reaches the server.
    pub fn mode(&self) -> ChannelMode {
        if self.policy.is_escalated() {
            ChannelMode::Fallback
        } else {
            self.client.mode()
        }
    }

    /// Current connection status of the underlying client.
    pub fn status(&self) -> ConnectionStatus {
        self.client.status()
    }

    /// Watch connection status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.client.subscribe_status()
    }

    /// Whether the driver task is currently running.
    pub fn is_running(&self) -> bool {
        self.client.is_running()
    }

    /// Total transport dials since the channel was created.
    pub fn total_attempts(&self) -> u32 {
        self.client.total_attempts()
    }
}
