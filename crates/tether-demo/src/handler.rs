//! Channel handler for the pair finder.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use tether_core::{ConnectionId, Envelope, Handler, HandlerError, Outbound};

use crate::pairs::{PairResult, calculate_pairs};

/// Envelope type carrying an input array.
pub const TYPE_ARRAY: &str = "array";
/// Envelope type carrying a broadcast result.
pub const TYPE_UPDATE: &str = "update";

/// Computes pair results from `array` envelopes and replays the latest
/// result to newly joined members.
pub struct PairFinderHandler {
    current: Mutex<Option<PairResult>>,
}

impl PairFinderHandler {
    /// New handler with no result yet.
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// The most recent result, if any input has been processed.
    pub fn current(&self) -> Option<PairResult> {
        self.current.lock().clone()
    }
}

impl Default for PairFinderHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for PairFinderHandler {
    async fn handle(
        &self,
        connection_id: &ConnectionId,
        envelope: Envelope,
    ) -> Result<Vec<Outbound>, HandlerError> {
        match envelope.kind.as_str() {
            TYPE_ARRAY => {
                let payload = envelope
                    .data
                    .ok_or_else(|| HandlerError::new("Input must be an array"))?;
                let result =
                    calculate_pairs(&payload).map_err(|e| HandlerError::new(e.to_string()))?;
                info!(
                    %connection_id,
                    len = result.original_array.len(),
                    "computed pair result"
                );

                let update = serde_json::to_value(&result)
                    .map_err(|e| HandlerError::new(e.to_string()))?;
                *self.current.lock() = Some(result);
                Ok(vec![Outbound::broadcast(Envelope::new(TYPE_UPDATE, update))])
            }
            other => Err(HandlerError::new(format!("Unknown message type: {other}"))),
        }
    }

    async fn on_connect(&self, _connection_id: &ConnectionId) -> Vec<Envelope> {
        let current = self.current.lock().clone();
        match current.and_then(|r| serde_json::to_value(r).ok()) {
            Some(update) => vec![Envelope::new(TYPE_UPDATE, update)],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_core::Target;

    fn id() -> ConnectionId {
        ConnectionId::from("c1")
    }

    #[tokio::test]
    async fn array_envelope_broadcasts_update() {
        let handler = PairFinderHandler::new();
        let out = handler
            .handle(&id(), Envelope::new(TYPE_ARRAY, json!([3, 1, 4, 2, 7, 5])))
            .await
            .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target, Target::Broadcast);
        assert_eq!(out[0].envelope.kind, TYPE_UPDATE);
        let data = out[0].envelope.data.as_ref().unwrap();
        assert_eq!(data["min"], json!([2, 4]));
        assert_eq!(data["max"], json!([1, 2]));
    }

    #[tokio::test]
    async fn invalid_array_is_rejected_with_contract_message() {
        let handler = PairFinderHandler::new();
        let err = handler
            .handle(&id(), Envelope::new(TYPE_ARRAY, json!([1, 2])))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Array length must be between 3 and 100000");
        // A rejected input does not clobber the stored result.
        assert!(handler.current().is_none());
    }

    #[tokio::test]
    async fn missing_payload_is_rejected() {
        let handler = PairFinderHandler::new();
        let err = handler
            .handle(&id(), Envelope::bare(TYPE_ARRAY))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Input must be an array");
    }

    #[tokio::test]
    async fn unknown_type_is_rejected() {
        let handler = PairFinderHandler::new();
        let err = handler
            .handle(&id(), Envelope::bare("matrix"))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Unknown message type: matrix");
    }

    #[tokio::test]
    async fn latest_result_replayed_on_connect() {
        let handler = PairFinderHandler::new();
        assert!(handler.on_connect(&id()).await.is_empty());

        let _ = handler
            .handle(&id(), Envelope::new(TYPE_ARRAY, json!([5, 1, 9])))
            .await
            .unwrap();

        let replay = handler.on_connect(&id()).await;
        assert_eq!(replay.len(), 1);
        assert_eq!(replay[0].kind, TYPE_UPDATE);
        assert_eq!(
            replay[0].data.as_ref().unwrap()["originalArray"],
            json!([5, 1, 9])
        );
    }

    #[tokio::test]
    async fn newer_result_replaces_stored_one() {
        let handler = PairFinderHandler::new();
        let _ = handler
            .handle(&id(), Envelope::new(TYPE_ARRAY, json!([5, 1, 9])))
            .await
            .unwrap();
        let _ = handler
            .handle(&id(), Envelope::new(TYPE_ARRAY, json!([2, 4, 6])))
            .await
            .unwrap();

        let current = handler.current().unwrap();
        assert_eq!(current.original_array, vec![2, 4, 6]);
    }
}
