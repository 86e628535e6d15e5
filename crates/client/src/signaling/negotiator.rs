//! Offer/answer negotiation against the signaling endpoint

use super::protocol::{AnswerResponse, OfferRequest};
use crate::config::{SessionConfig, TokenProvider};
use crate::error::NegotiationError;
use crate::peer::PeerHandle;
use crate::{Error, Result};
use std::time::Duration;
use tracing::{debug, info};
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// HTTP timeout for the single signaling round trip
const SIGNALING_TIMEOUT: Duration = Duration::from_secs(30);

/// Drives the signaling handshake for one session.
///
/// Performs exactly one offer/answer exchange; any failure surfaces as a
/// single [`NegotiationError`] and retries are the caller's responsibility.
pub struct Negotiator {
    /// Resolved offer endpoint, e.g. "https://rppg.example.com/offer"
    endpoint: String,

    /// Server-side video transform requested in the offer body
    video_transform: String,

    /// Reqwest HTTP client
    client: reqwest::Client,
}

impl Negotiator {
    /// Create a negotiator for the configured signaling endpoint
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SIGNALING_TIMEOUT)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: format!("{}/offer", config.signaling_url.trim_end_matches('/')),
            video_transform: config.video_transform.clone(),
            client,
        })
    }

    /// Run the offer/answer handshake on `handle`
    ///
    /// 1. Create the local offer and apply it as the local description.
    /// 2. Suspend until ICE candidate gathering completes.
    /// 3. Read the finalized local description.
    /// 4. Obtain a bearer token from the provider.
    /// 5. POST the offer to the signaling endpoint.
    /// 6. Parse the response and apply it as the remote description.
    pub async fn negotiate(
        &self,
        handle: &PeerHandle,
        tokens: &dyn TokenProvider,
    ) -> std::result::Result<(), NegotiationError> {
        handle.create_offer().await?;

        handle.wait_ice_gathering_complete().await;

        let local = handle
            .local_description()
            .await
            .ok_or(NegotiationError::NoLocalDescription)?;

        let token = tokens
            .token()
            .await
            .map_err(|e| NegotiationError::AuthFailure(e.to_string()))?;

        let request = OfferRequest {
            sdp: local.sdp,
            kind: local.sdp_type.to_string(),
            video_transform: self.video_transform.clone(),
        };

        debug!(endpoint = %self.endpoint, "posting offer");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| NegotiationError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NegotiationError::SignalingHttp {
                status: status.as_u16(),
            });
        }

        let answer: AnswerResponse = response
            .json()
            .await
            .map_err(|e| NegotiationError::MalformedAnswer(e.to_string()))?;

        let remote = match answer.kind.as_str() {
            "answer" => RTCSessionDescription::answer(answer.sdp),
            "pranswer" => RTCSessionDescription::pranswer(answer.sdp),
            other => {
                return Err(NegotiationError::MalformedAnswer(format!(
                    "unexpected description type {:?}",
                    other
                )))
            }
        }
        .map_err(|e| NegotiationError::MalformedAnswer(e.to_string()))?;

        handle.set_remote_description(remote).await?;

        info!("negotiation complete");

        Ok(())
    }
}
