//! Error types for the rPPG session client

/// Result type alias using the session client Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in session client operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Local camera/microphone acquisition failed or was denied
    #[error("Media acquisition failed: {0}")]
    MediaAcquisition(String),

    /// Offer/answer signaling handshake failed
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    /// WebRTC peer connection error
    #[error("Peer connection error: {0}")]
    PeerConnection(String),

    /// Control channel error
    #[error("Data channel error: {0}")]
    DataChannel(String),

    /// Media track error
    #[error("Media track error: {0}")]
    MediaTrack(String),

    /// Session lifecycle error (wrong state for the requested operation)
    #[error("Session error: {0}")]
    Session(String),

    /// Any other error (embedder-supplied capabilities)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failures of the offer/answer handshake against the signaling endpoint.
///
/// The negotiator performs no internal retries; each variant surfaces once
/// to the caller, which decides whether to retry the whole handshake.
#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    /// No finalized local description after ICE gathering
    #[error("no local description after ICE gathering")]
    NoLocalDescription,

    /// Bearer token acquisition failed
    #[error("auth token acquisition failed: {0}")]
    AuthFailure(String),

    /// Signaling endpoint answered with a non-2xx status
    #[error("signaling endpoint returned HTTP {status}")]
    SignalingHttp {
        /// HTTP status code from the /offer call
        status: u16,
    },

    /// Signaling endpoint response was not a well-formed session description
    #[error("malformed answer from signaling endpoint: {0}")]
    MalformedAnswer(String),

    /// SDP creation or application failed on the local transport
    #[error("SDP error: {0}")]
    Sdp(String),

    /// The HTTP request never produced a response
    #[error("signaling request failed: {0}")]
    Http(String),
}

impl Error {
    /// Check if this error terminates the session (transitions to Closed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::MediaAcquisition(_) | Error::Negotiation(_))
    }

    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }
}
