//! HTTP polling fallback.
//!
//! When the WebSocket transport fails repeatedly, the [`ResilientChannel`]
//! layer escalates to posting envelopes against the server's `/api/action`
//! endpoint. Escalation is sticky: once entered, the WebSocket is not
//! probed again until the application explicitly reconnects.
//!
//! [`ResilientChannel`]: crate::resilient::ResilientChannel

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use tether_core::Envelope;

use crate::channel::RetryGate;
use crate::error::ClientError;

/// Response body of the fallback action endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackResponse {
    /// Whether the action was handled.
    pub success: bool,
    /// Result payload on success.
    #[serde(default)]
    pub data: Option<Value>,
    /// Failure message otherwise.
    #[serde(default)]
    pub error: Option<String>,
}

/// Posts channel envelopes to the HTTP action endpoint.
pub struct FallbackTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl FallbackTransport {
    /// Create a transport posting to the given endpoint URL.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// The endpoint this transport posts to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one envelope as `{action, data}` and return the result payload.
    ///
    /// A transport-level failure or a non-2xx status is an error; so is a
    /// well-formed response with `success: false`.
    pub async fn send(&self, envelope: &Envelope) -> Result<Option<Value>, ClientError> {
        let mut body = serde_json::Map::new();
        let _ = body.insert("action".into(), Value::String(envelope.kind.clone()));
        if let Some(data) = &envelope.data {
            let _ = body.insert("data".into(), data.clone());
        }

        debug!(action = %envelope.kind, "posting action over fallback");
        let response: FallbackResponse = self
            .client
            .post(&self.endpoint)
            .json(&Value::Object(body))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.success {
            Ok(response.data)
        } else {
            Err(ClientError::Rejected(
                response.error.unwrap_or_else(|| "unknown error".into()),
            ))
        }
    }
}

/// Tracks consecutive transport failures and decides when to escalate.
///
/// Sticky: once the threshold is crossed, [`is_escalated`] stays `true`
/// until [`reset`]. A successful connection clears the failure streak only
/// while not yet escalated.
///
/// [`is_escalated`]: EscalationPolicy::is_escalated
/// [`reset`]: EscalationPolicy::reset
pub struct EscalationPolicy {
    threshold: u32,
    consecutive_failures: AtomicU32,
    escalated: AtomicBool,
}

impl EscalationPolicy {
    /// Escalate after `threshold` consecutive failures. A threshold of 0
    /// disables escalation.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive_failures: AtomicU32::new(0),
            escalated: AtomicBool::new(false),
        }
    }

    /// Record one failed transport attempt. Returns whether the policy is
    /// now (or already was) escalated.
    pub fn record_failure(&self) -> bool {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if self.threshold > 0 && failures >= self.threshold {
            self.escalated.store(true, Ordering::SeqCst);
        }
        self.is_escalated()
    }

    /// Record a successful connection, clearing the streak unless already
    /// escalated.
    pub fn record_success(&self) {
        if !self.is_escalated() {
            self.consecutive_failures.store(0, Ordering::SeqCst);
        }
    }

    /// Whether the policy has escalated to the fallback.
    pub fn is_escalated(&self) -> bool {
        self.escalated.load(Ordering::SeqCst)
    }

    /// Current consecutive-failure streak.
    pub fn failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Clear all state, un-escalating. Used on an explicit reconnect request.
    pub fn reset(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.escalated.store(false, Ordering::SeqCst);
    }
}

/// The policy plugs straight into the driver's retry seam: an escalated
/// policy stops the dial loop.
impl RetryGate for EscalationPolicy {
    fn dial_failed(&self) -> bool {
        self.record_failure()
    }

    fn dial_succeeded(&self) {
        self.record_success();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalates_at_threshold() {
        let policy = EscalationPolicy::new(2);
        assert!(!policy.record_failure());
        assert!(policy.record_failure());
        assert!(policy.is_escalated());
    }

    #[test]
    fn success_resets_streak_before_escalation() {
        let policy = EscalationPolicy::new(2);
        assert!(!policy.record_failure());
        policy.record_success();
        assert_eq!(policy.failures(), 0);
        // The streak restarts; a single new failure does not escalate.
        assert!(!policy.record_failure());
    }

    #[test]
    fn escalation_is_sticky_across_success() {
        let policy = EscalationPolicy::new(2);
        let _ = policy.record_failure();
        let _ = policy.record_failure();
        policy.record_success();
        assert!(policy.is_escalated());
    }

    #[test]
    fn reset_clears_escalation() {
        let policy = EscalationPolicy::new(2);
        let _ = policy.record_failure();
        let _ = policy.record_failure();
        policy.reset();
        assert!(!policy.is_escalated());
        assert_eq!(policy.failures(), 0);
    }

    #[test]
    fn zero_threshold_never_escalates() {
        let policy = EscalationPolicy::new(0);
        for _ in 0..10 {
            assert!(!policy.record_failure());
        }
    }

    #[test]
    fn response_deserializes_with_optional_fields() {
        let ok: FallbackResponse = serde_json::from_str(r#"{"success":true,"data":[1,2]}"#).unwrap();
        assert!(ok.success);
        assert_eq!(ok.data, Some(serde_json::json!([1, 2])));
        assert!(ok.error.is_none());

        let err: FallbackResponse =
            serde_json::from_str(r#"{"success":false,"error":"nope"}"#).unwrap();
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("nope"));
    }
}
