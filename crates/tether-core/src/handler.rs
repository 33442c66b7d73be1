//! The application collaborator invoked by the server registry.

use async_trait::async_trait;

use crate::envelope::{Envelope, Outbound};
use crate::error::HandlerError;
use crate::ids::ConnectionId;

/// Application message handler.
///
/// The registry performs all delivery I/O; the handler only computes.
/// Given the sender's connection id and a decoded envelope, it returns zero
/// or more outbound envelopes tagged either reply-to-sender or broadcast.
///
/// Reserved `ping` envelopes are answered inside the channel layer and never
/// reach the handler.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Process one inbound envelope.
    ///
    /// An `Err` is converted to an `error` envelope unicast to the sender;
    /// it does not close the connection.
    async fn handle(
        &self,
        connection_id: &ConnectionId,
        envelope: Envelope,
    ) -> Result<Vec<Outbound>, HandlerError>;

    /// Initial-state payloads for a newly connected member.
    ///
    /// Sent to that member immediately after it joins the registry. The
    /// default is no initial state.
    async fn on_connect(&self, connection_id: &ConnectionId) -> Vec<Envelope> {
        let _ = connection_id;
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn handle(
            &self,
            _connection_id: &ConnectionId,
            envelope: Envelope,
        ) -> Result<Vec<Outbound>, HandlerError> {
            Ok(vec![Outbound::reply(envelope)])
        }
    }

    #[tokio::test]
    async fn default_on_connect_is_empty() {
        let handler = Echo;
        let id = ConnectionId::new();
        assert!(handler.on_connect(&id).await.is_empty());
    }

    #[tokio::test]
    async fn handle_returns_tagged_outbound() {
        let handler = Echo;
        let id = ConnectionId::new();
        let out = handler
            .handle(&id, Envelope::bare("update"))
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].envelope.kind, "update");
    }
}
