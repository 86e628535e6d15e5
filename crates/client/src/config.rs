//! Configuration types for the rPPG session client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration for an rPPG session
///
/// Immutable for the session's lifetime; the embedding application supplies
/// the signaling endpoint and relay credentials at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Base URL of the inference server's signaling endpoint (http:// or https://)
    pub signaling_url: String,

    /// ICE server list (STUN/TURN, including relay credentials), passed
    /// through verbatim to the peer transport. Empty means host candidates only.
    #[serde(default)]
    pub ice_servers: Vec<IceServerSpec>,

    /// Local media to acquire (video required, audio optional)
    #[serde(default)]
    pub media: MediaConstraints,

    /// ICE candidate pool size handed to the peer transport (default: 2)
    pub ice_candidate_pool_size: u8,

    /// Heartbeat tick interval in milliseconds (default: 500ms)
    pub heartbeat_interval_ms: u64,

    /// Grace delay before the transport is closed during teardown, allowing
    /// in-flight close frames to flush (default: 500ms)
    pub teardown_grace_ms: u64,

    /// Server-side video transform requested in the offer (default: "mask")
    pub video_transform: String,
}

/// A single STUN/TURN server entry
///
/// Opaque to the client; mapped verbatim onto the transport's ICE server list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerSpec {
    /// One or more server URIs (stun:, turn:, turns:)
    pub urls: Vec<String>,

    /// Username for TURN authentication
    pub username: Option<String>,

    /// Credential for TURN authentication
    pub credential: Option<String>,
}

/// Which local capture tracks to acquire
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MediaConstraints {
    /// Acquire a video track (required for rPPG inference)
    pub video: bool,

    /// Acquire an audio track
    pub audio: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            video: true,
            audio: false,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            signaling_url: "http://localhost:8080".to_string(),
            ice_servers: Vec::new(),
            media: MediaConstraints::default(),
            ice_candidate_pool_size: 2,
            heartbeat_interval_ms: 500,
            teardown_grace_ms: 500,
            video_transform: "mask".to_string(),
        }
    }
}

impl SessionConfig {
    /// Create a configuration for the given signaling endpoint
    pub fn new(signaling_url: impl Into<String>) -> Self {
        Self {
            signaling_url: signaling_url.into(),
            ..Default::default()
        }
    }

    /// Add ICE servers to this configuration
    ///
    /// Useful for chaining with `new`.
    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServerSpec>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    /// Set the media constraints for this configuration
    pub fn with_media(mut self, media: MediaConstraints) -> Self {
        self.media = media;
        self
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `signaling_url` is not a valid http:// or https:// URL
    /// - `heartbeat_interval_ms` is zero
    /// - video capture is disabled (required for inference)
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        let url = url::Url::parse(&self.signaling_url).map_err(|e| {
            Error::InvalidConfig(format!(
                "signaling_url is not a valid URL ({}): {}",
                self.signaling_url, e
            ))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::InvalidConfig(format!(
                "signaling_url must start with http:// or https://, got {}",
                self.signaling_url
            )));
        }

        if self.heartbeat_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "heartbeat_interval_ms must be non-zero".to_string(),
            ));
        }

        if !self.media.video {
            return Err(Error::InvalidConfig(
                "video capture is required for an rPPG session".to_string(),
            ));
        }

        Ok(())
    }

    /// Heartbeat tick interval as a [`Duration`]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Teardown grace delay as a [`Duration`]
    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.teardown_grace_ms)
    }
}

/// Capability producing a bearer token for the signaling handshake on demand.
///
/// Replaces ambient environment reads; the embedding application decides how
/// tokens are minted or refreshed. Acquisition may itself be asynchronous,
/// and a failure aborts negotiation.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Produce a bearer token for the next signaling request
    async fn token(&self) -> anyhow::Result<String>;
}

/// Token provider returning a fixed, pre-issued token
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Wrap a pre-issued bearer token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> anyhow::Result<String> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_http_signaling_url_fails() {
        let config = SessionConfig::new("ws://localhost:8080");
        assert!(config.validate().is_err());

        let config = SessionConfig::new("not a url");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_heartbeat_interval_fails() {
        let mut config = SessionConfig::default();
        config.heartbeat_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_video_required() {
        let config = SessionConfig::default().with_media(MediaConstraints {
            video: false,
            audio: true,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_chain() {
        let config = SessionConfig::new("https://rppg.example.com")
            .with_ice_servers(vec![IceServerSpec {
                urls: vec!["turn:turn.example.com:3478".to_string()],
                username: Some("user".to_string()),
                credential: Some("pass".to_string()),
            }])
            .with_media(MediaConstraints {
                video: true,
                audio: true,
            });

        assert!(config.validate().is_ok());
        assert_eq!(config.ice_servers.len(), 1);
        assert!(config.media.audio);
    }

    #[test]
    fn test_config_serialization() {
        let config = SessionConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.signaling_url, deserialized.signaling_url);
        assert_eq!(config.video_transform, deserialized.video_transform);
    }

    #[test]
    fn test_static_token_provider() {
        let provider = StaticTokenProvider::new("secret");
        let token = tokio_test::block_on(provider.token()).unwrap();
        assert_eq!(token, "secret");
    }
}
