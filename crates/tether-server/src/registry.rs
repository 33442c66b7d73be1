//! Membership set and message dispatch.
//!
//! The [`Registry`] owns the live-connection set. Only its own handlers
//! mutate it: sessions call [`Registry::join`] / [`Registry::leave`], the
//! sweep calls [`Registry::leave`]. No ambient global — the registry is an
//! explicitly constructed instance passed to the server bootstrap.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use tether_core::envelope::Target;
use tether_core::{ConnectionId, Envelope, Handler};

use crate::connection::Connection;

/// Envelope type sent to a member immediately after it joins.
pub const TYPE_CONNECTED: &str = "connected";

/// Live-connection registry with unicast/broadcast delivery.
pub struct Registry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    handler: Arc<dyn Handler>,
}

impl Registry {
    /// Create a registry dispatching to the given application handler.
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            handler,
        }
    }

    /// The application handler (also used by the HTTP fallback surface).
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Admit a connection: mark it open, add it to the membership set, and
    /// send it the greeting plus any application initial-state payloads.
    pub async fn join(&self, connection: Arc<Connection>) {
        if !connection.open() {
            warn!(id = %connection.id, "refusing to admit connection not in connecting state");
            return;
        }
        {
            let mut conns = self.connections.write().await;
            let _ = conns.insert(connection.id.clone(), connection.clone());
        }
        debug!(id = %connection.id, "connection joined");

        let greeting = Envelope::new(
            TYPE_CONNECTED,
            serde_json::json!({ "connectionId": connection.id }),
        );
        let _ = self.unicast(&connection, &greeting);
        for envelope in self.handler.on_connect(&connection.id).await {
            let _ = self.unicast(&connection, &envelope);
        }
    }

    /// Remove a connection and close it.
    ///
    /// Idempotent: removing an unknown or already-removed id is a no-op.
    /// Returns `true` only when the connection was actually removed.
    pub async fn leave(&self, id: &ConnectionId) -> bool {
        let removed = {
            let mut conns = self.connections.write().await;
            conns.remove(id)
        };
        match removed {
            Some(connection) => {
                let _ = connection.close();
                debug!(%id, "connection left");
                true
            }
            None => false,
        }
    }

    /// Send an envelope to one connection.
    ///
    /// Silently drops (with a log line) if the connection is not open or its
    /// queue is full — never raises to the caller.
    pub fn unicast(&self, connection: &Connection, envelope: &Envelope) -> bool {
        let sent = connection.send(envelope);
        if !sent {
            warn!(id = %connection.id, kind = %envelope.kind, "unicast dropped");
        }
        sent
    }

    /// Fan an envelope out to a snapshot of the current membership set.
    ///
    /// A failed delivery to one member never aborts delivery to the rest.
    /// Delivery order across members is unspecified.
    pub async fn broadcast(&self, envelope: &Envelope) {
        let text = Arc::new(envelope.to_json());
        let members = self.snapshot().await;
        debug!(kind = %envelope.kind, recipients = members.len(), "broadcast");
        for connection in members {
            if !connection.send_text(text.clone()) {
                warn!(id = %connection.id, kind = %envelope.kind, "broadcast delivery dropped");
            }
        }
    }

    /// Process one raw inbound frame from a connection.
    ///
    /// - `ping` is answered with `pong` to that connection only
    /// - malformed frames get an `error` envelope to the sender only
    /// - everything else goes to the application handler, whose failure is
    ///   also converted to a sender-only `error` envelope
    pub async fn dispatch(&self, connection: &Arc<Connection>, raw: &str) {
        connection.mark_alive();

        let envelope = match Envelope::from_json(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(id = %connection.id, error = %e, "malformed frame");
                let _ = self.unicast(connection, &Envelope::error("Invalid message format"));
                return;
            }
        };

        if envelope.is_ping() {
            let _ = self.unicast(connection, &Envelope::pong());
            return;
        }
        if envelope.is_pong() {
            // Liveness already recorded above; reserved types never reach
            // the application.
            return;
        }

        match self.handler.handle(&connection.id, envelope).await {
            Ok(outbound) => {
                for out in outbound {
                    match out.target {
                        Target::Sender => {
                            let _ = self.unicast(connection, &out.envelope);
                        }
                        Target::Broadcast => self.broadcast(&out.envelope).await,
                    }
                }
            }
            Err(e) => {
                debug!(id = %connection.id, error = %e, "handler rejected envelope");
                let _ = self.unicast(connection, &Envelope::error(e.message()));
            }
        }
    }

    /// Number of live members.
    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether the id is currently a member.
    pub async fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.read().await.contains_key(id)
    }

    /// A point-in-time copy of the membership set.
    pub async fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().await.values().cloned().collect()
    }
}
