//! Peer transport handle
//!
//! Opaque wrapper around the one externally-provided primitive the client
//! depends on: `webrtc::RTCPeerConnection`. The handle owns handler
//! registration (the underlying crate keeps a single slot per event, so all
//! consumers share the registrations made here) and exposes exactly the
//! operations the negotiator and the session lifecycle need.

use crate::config::SessionConfig;
use crate::error::NegotiationError;
use crate::{Error, Result};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_gathering_state::RTCIceGatheringState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// A state-change notification from the underlying transport.
///
/// Forwarded to the registered observer on every change, in the order the
/// transport emits them. Informational; the session lifecycle reacts only to
/// the `Connection` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// ICE candidate gathering state changed
    IceGathering(RTCIceGathererState),
    /// ICE connection state changed
    IceConnection(RTCIceConnectionState),
    /// SDP signaling state changed
    Signaling(RTCSignalingState),
    /// Overall peer connection state changed
    Connection(RTCPeerConnectionState),
}

/// Observer callback for transport state changes
pub type TransportEventCallback = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// Wrapper around the peer connection primitive
///
/// The session lifecycle manager exclusively owns the handle; other
/// components borrow it for the duration of one operation.
pub struct PeerHandle {
    /// Actual WebRTC peer connection
    pc: Arc<RTCPeerConnection>,

    /// Registered state-change observer (set once by the session)
    observer: Arc<Mutex<Option<TransportEventCallback>>>,

    /// Latched true once ICE gathering reaches completion
    gathering_rx: watch::Receiver<bool>,
}

impl PeerHandle {
    /// Create a new peer transport from the session configuration
    ///
    /// Builds the WebRTC API with default codecs and interceptors, maps the
    /// configured ICE servers verbatim, and registers the state-change
    /// handlers that feed [`TransportEvent`]s to the observer.
    pub async fn new(config: &SessionConfig) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::PeerConnection(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry = register_default_interceptors(Default::default(), &mut media_engine)
            .map_err(|e| Error::PeerConnection(format!("Failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let ice_servers: Vec<RTCIceServer> = config
            .ice_servers
            .iter()
            .map(|spec| RTCIceServer {
                urls: spec.urls.clone(),
                username: spec.username.clone().unwrap_or_default(),
                credential: spec.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ice_candidate_pool_size: config.ice_candidate_pool_size,
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(rtc_config).await.map_err(|e| {
            Error::PeerConnection(format!("Failed to create peer connection: {}", e))
        })?);

        let observer: Arc<Mutex<Option<TransportEventCallback>>> = Arc::new(Mutex::new(None));
        let (gathering_tx, gathering_rx) = watch::channel(false);
        let gathering_tx = Arc::new(gathering_tx);

        // Single registration per event slot: forward to the observer, and
        // latch gathering completion for wait_ice_gathering_complete.
        {
            let observer = Arc::clone(&observer);
            let gathering_tx = Arc::clone(&gathering_tx);
            pc.on_ice_gathering_state_change(Box::new(move |state: RTCIceGathererState| {
                if state == RTCIceGathererState::Complete {
                    let _ = gathering_tx.send(true);
                }
                Self::notify(&observer, TransportEvent::IceGathering(state));
                Box::pin(async {})
            }));
        }
        {
            let observer = Arc::clone(&observer);
            pc.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
                Self::notify(&observer, TransportEvent::IceConnection(state));
                Box::pin(async {})
            }));
        }
        {
            let observer = Arc::clone(&observer);
            pc.on_signaling_state_change(Box::new(move |state: RTCSignalingState| {
                Self::notify(&observer, TransportEvent::Signaling(state));
                Box::pin(async {})
            }));
        }
        {
            let observer = Arc::clone(&observer);
            let gathering_tx = Arc::clone(&gathering_tx);
            pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
                debug!("peer connection state: {}", state);
                // A dead transport also releases gathering waiters, so a
                // negotiation cancelled by teardown does not wait forever.
                if matches!(
                    state,
                    RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed
                ) {
                    let _ = gathering_tx.send(true);
                }
                Self::notify(&observer, TransportEvent::Connection(state));
                Box::pin(async {})
            }));
        }

        info!("created peer transport");

        Ok(Self {
            pc,
            observer,
            gathering_rx,
        })
    }

    fn notify(observer: &Mutex<Option<TransportEventCallback>>, event: TransportEvent) {
        let cb = observer.lock().unwrap().clone();
        if let Some(cb) = cb {
            cb(event);
        }
    }

    /// Register the state-change observer
    ///
    /// Events emitted before registration are dropped.
    pub fn set_event_observer(&self, observer: TransportEventCallback) {
        *self.observer.lock().unwrap() = Some(observer);
    }

    /// Create a local offer and apply it as the local description
    pub async fn create_offer(&self) -> std::result::Result<(), NegotiationError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| NegotiationError::Sdp(format!("Failed to create offer: {}", e)))?;

        self.pc
            .set_local_description(offer)
            .await
            .map_err(|e| NegotiationError::Sdp(format!("Failed to set local description: {}", e)))?;

        debug!("created local offer");

        Ok(())
    }

    /// Suspend until ICE candidate gathering reaches completion.
    ///
    /// Checks the current state before subscribing, so a transition that
    /// happened before this call cannot be missed: already-complete
    /// short-circuits immediately instead of waiting for an event that will
    /// never fire again.
    pub async fn wait_ice_gathering_complete(&self) {
        if self.pc.ice_gathering_state() == RTCIceGatheringState::Complete {
            return;
        }

        let mut rx = self.gathering_rx.clone();
        // wait_for resolves immediately when the latch is already true
        let _ = rx.wait_for(|complete| *complete).await;

        debug!("ICE gathering complete");
    }

    /// Read the finalized local description, if one has been applied
    pub async fn local_description(&self) -> Option<RTCSessionDescription> {
        self.pc.local_description().await
    }

    /// Apply the remote session description (the answer)
    pub async fn set_remote_description(
        &self,
        answer: RTCSessionDescription,
    ) -> std::result::Result<(), NegotiationError> {
        self.pc
            .set_remote_description(answer)
            .await
            .map_err(|e| NegotiationError::Sdp(format!("Failed to set remote description: {}", e)))
    }

    /// Attach a local media track; returns the RTP sender carrying it
    pub async fn add_track(
        &self,
        track: Arc<dyn TrackLocal + Send + Sync>,
    ) -> Result<Arc<RTCRtpSender>> {
        self.pc
            .add_track(track)
            .await
            .map_err(|e| Error::MediaTrack(format!("Failed to add track: {}", e)))
    }

    /// All transceivers currently attached to the transport
    pub async fn transceivers(&self) -> Vec<Arc<RTCRtpTransceiver>> {
        self.pc.get_transceivers().await
    }

    /// All RTP senders currently attached to the transport
    pub async fn senders(&self) -> Vec<Arc<RTCRtpSender>> {
        self.pc.get_senders().await
    }

    /// Register a callback for remote media track arrival
    ///
    /// The embedder renders the track; the client only surfaces it.
    pub fn on_remote_track<F>(&self, handler: F)
    where
        F: Fn(Arc<TrackRemote>) + Send + Sync + 'static,
    {
        self.pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            handler(track);
            Box::pin(async {})
        }));
    }

    /// Register a callback for data channels announced by the remote peer
    pub fn on_data_channel<F>(&self, handler: F)
    where
        F: Fn(Arc<RTCDataChannel>) + Send + Sync + 'static,
    {
        self.pc.on_data_channel(Box::new(move |channel| {
            handler(channel);
            Box::pin(async {})
        }));
    }

    /// The underlying peer connection, for channel creation
    pub(crate) fn connection(&self) -> &Arc<RTCPeerConnection> {
        &self.pc
    }

    /// Close the underlying transport
    pub async fn close(&self) -> Result<()> {
        info!("closing peer transport");

        self.pc
            .close()
            .await
            .map_err(|e| Error::PeerConnection(format!("Failed to close connection: {}", e)))
    }
}
