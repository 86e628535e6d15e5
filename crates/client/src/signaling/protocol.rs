//! Wire types for the /offer signaling exchange

use serde::{Deserialize, Serialize};

/// Request body for `POST /offer`
#[derive(Debug, Clone, Serialize)]
pub struct OfferRequest {
    /// Finalized local SDP (candidates included)
    pub sdp: String,

    /// Description type, always "offer" on this path
    #[serde(rename = "type")]
    pub kind: String,

    /// Server-side video transform to apply to the returned stream
    pub video_transform: String,
}

/// Response body from `POST /offer`: the remote session description
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerResponse {
    /// Remote SDP
    pub sdp: String,

    /// Description type ("answer" or "pranswer")
    #[serde(rename = "type")]
    pub kind: String,
}
