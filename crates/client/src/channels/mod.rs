//! Control-channel plumbing
//!
//! The session keeps one bidirectional text channel to the inference server:
//! outbound heartbeat pings, inbound biometric results and frame-rate
//! metrics. Inbound payloads carry no fixed schema and are classified by
//! substring heuristics before decoding.

pub mod dispatch;
pub mod heartbeat;

pub use dispatch::{BiometricResult, ResultDispatcher};
pub use heartbeat::HeartbeatChannel;

use std::sync::Arc;
use tracing::debug;
use webrtc::data_channel::RTCDataChannel;

/// Observer callback for inbound metrics text ("fps" payloads)
pub type MetricsCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Classification of an inbound control-channel payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Carries a biometric result, JSON-decoded by the dispatcher
    Biometric,
    /// Frame-rate metrics text, forwarded without decoding
    Metrics,
    /// Anything else; dropped without error
    Unknown,
}

/// Classify an inbound payload by its recognizable markers
pub fn classify(payload: &str) -> PayloadKind {
    if payload.contains("bpm") {
        PayloadKind::Biometric
    } else if payload.contains("fps") {
        PayloadKind::Metrics
    } else {
        PayloadKind::Unknown
    }
}

/// Routes classified inbound payloads to the dispatcher or metrics observer
pub(crate) struct InboundRouter {
    dispatcher: Arc<ResultDispatcher>,
    metrics: Option<MetricsCallback>,
}

impl InboundRouter {
    pub(crate) fn new(dispatcher: Arc<ResultDispatcher>, metrics: Option<MetricsCallback>) -> Self {
        Self {
            dispatcher,
            metrics,
        }
    }

    pub(crate) fn route(&self, payload: &str) {
        match classify(payload) {
            PayloadKind::Biometric => self.dispatcher.dispatch(payload),
            PayloadKind::Metrics => {
                if let Some(cb) = &self.metrics {
                    cb(payload.to_string());
                }
            }
            PayloadKind::Unknown => {
                debug!("dropping unrecognized control-channel payload");
            }
        }
    }
}

/// Attach inbound routing to a data channel.
///
/// Used for both the locally-created control channel and any channel the
/// remote peer announces. Binary and non-UTF-8 frames are dropped.
pub(crate) fn attach_inbound(channel: &Arc<RTCDataChannel>, router: Arc<InboundRouter>) {
    channel.on_message(Box::new(move |msg| {
        let router = Arc::clone(&router);
        Box::pin(async move {
            if !msg.is_string {
                debug!("dropping binary control-channel frame");
                return;
            }
            match String::from_utf8(msg.data.to_vec()) {
                Ok(text) => router.route(&text),
                Err(_) => debug!("dropping non-utf8 control-channel frame"),
            }
        })
    }));
}
