//! Decoding and delivery of inbound biometric results

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Callback invoked once per successfully decoded result, in arrival order
pub type ResultCallback = Arc<dyn Fn(BiometricResult) + Send + Sync>;

/// Observability hook for payloads that fail to decode
pub type DecodeFailureCallback = Arc<dyn Fn(String) + Send + Sync>;

/// One incremental inference result from the server.
///
/// Never constructed partially: a payload either decodes into a well-formed
/// result or is discarded. Unknown fields are preserved in `extra` so newer
/// servers can ship additional measurements without breaking older clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiometricResult {
    /// Estimated heart rate, beats per minute
    pub bpm: Option<f64>,

    /// Detected emotion label
    pub emotion: Option<String>,

    /// Shoulder tilt angle, degrees
    pub shoulder_tilt: Option<f64>,

    /// Neck tilt angle, degrees
    pub neck_tilt: Option<f64>,

    /// Forward-compatible additional fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Decodes inbound result payloads and forwards them to the caller.
///
/// Holds only non-owning callback registrations; the channel itself belongs
/// to the session. A malformed payload is reported to the observability hook
/// and swallowed; message-channel integrity is not assumed, and one bad
/// message never terminates the session.
pub struct ResultDispatcher {
    on_result: ResultCallback,
    on_decode_failure: Option<DecodeFailureCallback>,
}

impl ResultDispatcher {
    /// Create a dispatcher delivering results to `on_result`
    pub fn new(on_result: ResultCallback) -> Self {
        Self {
            on_result,
            on_decode_failure: None,
        }
    }

    /// Attach an observability hook for decode failures
    pub fn with_decode_observer(mut self, observer: DecodeFailureCallback) -> Self {
        self.on_decode_failure = Some(observer);
        self
    }

    /// Attempt structured decoding of a raw payload
    pub fn parse(raw: &str) -> Option<BiometricResult> {
        serde_json::from_str(raw).ok()
    }

    /// Decode `raw` and invoke the result callback exactly once on success
    pub fn dispatch(&self, raw: &str) {
        match serde_json::from_str::<BiometricResult>(raw) {
            Ok(result) => (self.on_result)(result),
            Err(e) => {
                warn!("failed to decode result payload: {}", e);
                if let Some(observer) = &self.on_decode_failure {
                    observer(e.to_string());
                }
            }
        }
    }
}
