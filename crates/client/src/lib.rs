//! WebRTC session client for remote rPPG biometric inference
//!
//! This crate establishes a peer-to-peer audio/video transport to a remote
//! inference server, negotiates the session over an HTTP offer/answer
//! exchange, keeps a heartbeat control channel alive, and delivers
//! incrementally-received biometric results to the caller.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  RppgSession (lifecycle: Idle → … → Closed)          │
//! │  ├─ PeerHandle (wraps webrtc::RTCPeerConnection)     │
//! │  ├─ Negotiator (HTTP POST /offer, bearer auth)       │
//! │  ├─ HeartbeatChannel ("ping <ms>" every 500ms)       │
//! │  └─ ResultDispatcher (inbound "bpm" JSON → caller)   │
//! │       ↓                                              │
//! │  remote rPPG inference server                        │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rppg_client::{RppgSession, SessionConfig, StaticTokenProvider, SyntheticMediaSource};
//!
//! # async fn example() -> rppg_client::Result<()> {
//! let config = SessionConfig::new("https://rppg.example.com");
//! let session = RppgSession::new(
//!     config,
//!     Arc::new(StaticTokenProvider::new("token")),
//!     Arc::new(SyntheticMediaSource::default()),
//! );
//!
//! session.on_result(|result| {
//!     if let Some(bpm) = result.bpm {
//!         println!("bpm: {}", bpm);
//!     }
//! });
//!
//! session.start().await?;
//! // ... consume results ...
//! session.stop().await;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod channels;
pub mod config;
pub mod error;
pub mod media;
pub mod peer;
pub mod session;
pub mod signaling;

// Re-exports for public API
pub use channels::{BiometricResult, HeartbeatChannel, PayloadKind, ResultDispatcher};
pub use config::{
    IceServerSpec, MediaConstraints, SessionConfig, StaticTokenProvider, TokenProvider,
};
pub use error::{Error, NegotiationError, Result};
pub use media::{LocalMedia, MediaSource, SyntheticMediaSource};
pub use peer::{PeerHandle, TransportEvent};
pub use session::{RppgSession, SessionState};
pub use signaling::Negotiator;

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
