//! Local media acquisition
//!
//! Camera/microphone access is a capability the embedding environment
//! provides on request. The client only needs track objects it can attach to
//! the peer transport; how frames get into them (capture pipeline, test
//! pattern, file playback) is the embedder's concern.

use crate::config::MediaConstraints;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

/// Local media tracks acquired for one session
pub struct LocalMedia {
    /// Tracks to attach to the peer transport, in attachment order
    pub tracks: Vec<Arc<dyn TrackLocal + Send + Sync>>,
}

impl LocalMedia {
    /// Number of acquired tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// True if acquisition produced no tracks
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Capability for acquiring local capture tracks
///
/// Failure here (device missing, permission denied) is terminal for the
/// session; the error is surfaced once and the session closes.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Acquire the tracks described by `constraints`
    async fn acquire(&self, constraints: &MediaConstraints) -> anyhow::Result<LocalMedia>;
}

/// Media source producing sample tracks without a capture device.
///
/// The tracks negotiate into the SDP like real capture tracks but carry no
/// frames until the embedder writes samples into them. Used by the tests and
/// by demos running on machines without a camera.
pub struct SyntheticMediaSource {
    stream_id: String,
}

impl SyntheticMediaSource {
    /// Create a synthetic source; `stream_id` groups the tracks into one stream
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
        }
    }
}

impl Default for SyntheticMediaSource {
    fn default() -> Self {
        Self::new("rppg-local")
    }
}

#[async_trait]
impl MediaSource for SyntheticMediaSource {
    async fn acquire(&self, constraints: &MediaConstraints) -> anyhow::Result<LocalMedia> {
        let mut tracks: Vec<Arc<dyn TrackLocal + Send + Sync>> = Vec::new();

        if constraints.video {
            let track = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: "video/VP8".to_string(),
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line: String::new(),
                    rtcp_feedback: vec![],
                },
                "video".to_string(),
                self.stream_id.clone(),
            ));
            tracks.push(track);
        }

        if constraints.audio {
            let track = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: "audio/opus".to_string(),
                    clock_rate: 48000,
                    channels: 2,
                    sdp_fmtp_line: String::new(),
                    rtcp_feedback: vec![],
                },
                "audio".to_string(),
                self.stream_id.clone(),
            ));
            tracks.push(track);
        }

        debug!(
            video = constraints.video,
            audio = constraints.audio,
            tracks = tracks.len(),
            "acquired synthetic media"
        );

        Ok(LocalMedia { tracks })
    }
}
