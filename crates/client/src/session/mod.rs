//! Session lifecycle management
//!
//! One `RppgSession` owns one transport to the inference server and drives
//! it through a fixed state machine:
//!
//! ```text
//! Idle --start()--> Negotiating --(negotiation ok)--> Connected
//!   Negotiating --(negotiation failure)--> Closed
//!   Connected --(remote close | stop())--> Disconnected --(teardown)--> Closed
//! ```
//!
//! All mutation happens in reaction to exactly one of: a timer tick, an
//! inbound message, a transport event, or an explicit API call. Shared state
//! sits behind short-lived locks that are never held across a network
//! suspension point, so `stop()` is safe concurrently with an in-flight
//! `start()`.

use crate::channels::dispatch::{DecodeFailureCallback, ResultCallback, ResultDispatcher};
use crate::channels::{BiometricResult, HeartbeatChannel, InboundRouter, MetricsCallback};
use crate::config::{SessionConfig, TokenProvider};
use crate::media::{LocalMedia, MediaSource};
use crate::peer::{PeerHandle, TransportEvent, TransportEventCallback};
use crate::signaling::Negotiator;
use crate::{Error, Result};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::track::track_remote::TrackRemote;

/// Authoritative session state; exactly one instance per session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not yet started
    Idle,
    /// Signaling handshake in flight
    Negotiating,
    /// Negotiation succeeded; transport live
    Connected,
    /// Connection ended after being established; teardown in progress
    Disconnected,
    /// All resources released
    Closed,
}

/// Callback invoked on every session state transition
pub type StateChangeCallback = Arc<dyn Fn(SessionState) + Send + Sync>;

/// Callback invoked once per terminal session error
pub type ErrorCallback = Arc<dyn Fn(&Error) + Send + Sync>;

/// Callback invoked when the remote peer adds a media track
pub type RemoteTrackCallback = Arc<dyn Fn(Arc<TrackRemote>) + Send + Sync>;

/// Registered caller callbacks.
///
/// Cells are read at invocation time, so registration after `start()` still
/// takes effect for later events.
#[derive(Default)]
struct SessionCallbacks {
    on_result: StdMutex<Option<ResultCallback>>,
    on_state_change: StdMutex<Option<StateChangeCallback>>,
    on_error: StdMutex<Option<ErrorCallback>>,
    on_metrics: StdMutex<Option<MetricsCallback>>,
    on_decode_failure: StdMutex<Option<DecodeFailureCallback>>,
    on_remote_track: StdMutex<Option<RemoteTrackCallback>>,
    on_transport_event: StdMutex<Option<TransportEventCallback>>,
}

/// Resources alive between `start()` and teardown.
///
/// Each field has a defined "not yet created" / "active" / "released"
/// lifecycle: `None` before creation, `Some` while active, taken back to
/// `None` exactly once during release.
#[derive(Default)]
struct OwnedResources {
    handle: Option<Arc<PeerHandle>>,
    heartbeat: Option<HeartbeatChannel>,
}

/// Real-time media session to a remote rPPG inference server.
///
/// Embeddable object: configure, register callbacks, `start()`, consume
/// results, `stop()`. Exactly one local and one remote party per instance;
/// a stopped session is not restartable.
pub struct RppgSession {
    session_id: String,
    config: SessionConfig,
    tokens: Arc<dyn TokenProvider>,
    media: Arc<dyn MediaSource>,
    state: Arc<RwLock<SessionState>>,
    resources: Arc<Mutex<OwnedResources>>,
    callbacks: Arc<SessionCallbacks>,
}

impl RppgSession {
    /// Create a session from its configuration and environment capabilities
    pub fn new(
        config: SessionConfig,
        tokens: Arc<dyn TokenProvider>,
        media: Arc<dyn MediaSource>,
    ) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            config,
            tokens,
            media,
            state: Arc::new(RwLock::new(SessionState::Idle)),
            resources: Arc::new(Mutex::new(OwnedResources::default())),
            callbacks: Arc::new(SessionCallbacks::default()),
        }
    }

    /// Get the session identifier
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Get the current session state
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Register the result callback, invoked once per decoded result in
    /// arrival order
    pub fn on_result<F>(&self, callback: F)
    where
        F: Fn(BiometricResult) + Send + Sync + 'static,
    {
        *self.callbacks.on_result.lock().unwrap() = Some(Arc::new(callback));
    }

    /// Register the state-change callback
    pub fn on_state_change<F>(&self, callback: F)
    where
        F: Fn(SessionState) + Send + Sync + 'static,
    {
        *self.callbacks.on_state_change.lock().unwrap() = Some(Arc::new(callback));
    }

    /// Register the error callback; fires once per terminal failure
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        *self.callbacks.on_error.lock().unwrap() = Some(Arc::new(callback));
    }

    /// Register the metrics observer for inbound frame-rate text
    pub fn on_metrics<F>(&self, callback: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        *self.callbacks.on_metrics.lock().unwrap() = Some(Arc::new(callback));
    }

    /// Register the observability hook for per-message decode failures
    pub fn on_decode_failure<F>(&self, callback: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        *self.callbacks.on_decode_failure.lock().unwrap() = Some(Arc::new(callback));
    }

    /// Register the remote-track callback; the embedder renders the stream
    pub fn on_remote_track<F>(&self, callback: F)
    where
        F: Fn(Arc<TrackRemote>) + Send + Sync + 'static,
    {
        *self.callbacks.on_remote_track.lock().unwrap() = Some(Arc::new(callback));
    }

    /// Register the informational transport state-change observer
    pub fn on_transport_event<F>(&self, callback: F)
    where
        F: Fn(TransportEvent) + Send + Sync + 'static,
    {
        *self.callbacks.on_transport_event.lock().unwrap() = Some(Arc::new(callback));
    }

    /// Start the session: acquire media, build the transport, negotiate.
    ///
    /// Resolves once negotiation finishes. Media-acquisition and negotiation
    /// failures are terminal: the error is reported once through `on_error`,
    /// the session transitions to `Closed`, and the same error is returned.
    /// A `stop()` racing this call wins; the late negotiation result is
    /// discarded instead of resurrecting the torn-down transport.
    pub async fn start(&self) -> Result<()> {
        self.config.validate()?;

        {
            let mut state = self.state.write().await;
            if *state != SessionState::Idle {
                return Err(Error::Session(format!(
                    "cannot start from state {:?}",
                    *state
                )));
            }
            *state = SessionState::Negotiating;
        }
        Self::emit_state(&self.callbacks, SessionState::Negotiating);

        info!(session_id = %self.session_id, "starting session");

        let media = match self.media.acquire(&self.config.media).await {
            Ok(media) => media,
            Err(e) => return self.fail(Error::MediaAcquisition(e.to_string())).await,
        };

        let handle = match self.setup_transport(media).await {
            Ok(Some(handle)) => handle,
            // stop() won the race during setup; nothing to negotiate
            Ok(None) => return Ok(()),
            Err(err) => return self.fail(err).await,
        };

        let negotiator = match Negotiator::new(&self.config) {
            Ok(negotiator) => negotiator,
            Err(err) => return self.fail(err).await,
        };

        match negotiator.negotiate(&handle, self.tokens.as_ref()).await {
            Ok(()) => {
                let mut state = self.state.write().await;
                if *state == SessionState::Negotiating {
                    *state = SessionState::Connected;
                    drop(state);
                    Self::emit_state(&self.callbacks, SessionState::Connected);
                    info!(session_id = %self.session_id, "session connected");
                } else {
                    debug!("negotiation finished after stop(); discarding result");
                }
                Ok(())
            }
            Err(neg_err) => {
                if *self.state.read().await != SessionState::Negotiating {
                    debug!("negotiation aborted by stop(): {}", neg_err);
                    return Ok(());
                }
                self.fail(Error::Negotiation(neg_err)).await
            }
        }
    }

    /// Stop the session and release every owned resource.
    ///
    /// Safe to call repeatedly and concurrently with an in-flight `start()`;
    /// every teardown step is best-effort and the observable end state is
    /// always `Closed`.
    pub async fn stop(&self) {
        info!(session_id = %self.session_id, "stopping session");

        if *self.state.read().await == SessionState::Connected {
            Self::transition(&self.state, &self.callbacks, SessionState::Disconnected).await;
            Self::release(&self.resources, self.config.teardown_grace()).await;
            Self::transition(&self.state, &self.callbacks, SessionState::Closed).await;
        } else {
            // Not connected: mark Closed first so a negotiation completing
            // mid-teardown observes the stop and discards its result.
            Self::transition(&self.state, &self.callbacks, SessionState::Closed).await;
            Self::release(&self.resources, self.config.teardown_grace()).await;
        }
    }

    /// Build the transport and control channel under the resources lock, so
    /// a concurrent `stop()` observes either no resources or all of them.
    async fn setup_transport(&self, media: LocalMedia) -> Result<Option<Arc<PeerHandle>>> {
        let mut resources = self.resources.lock().await;

        if *self.state.read().await != SessionState::Negotiating {
            return Ok(None);
        }

        let handle = Arc::new(PeerHandle::new(&self.config).await?);

        handle.set_event_observer(self.transport_observer());

        {
            let callbacks = Arc::clone(&self.callbacks);
            handle.on_remote_track(move |track| {
                let cb = callbacks.on_remote_track.lock().unwrap().clone();
                if let Some(cb) = cb {
                    cb(track);
                }
            });
        }

        let router = Arc::new(self.build_router());

        {
            let router = Arc::clone(&router);
            handle.on_data_channel(move |channel| {
                debug!(label = %channel.label(), "remote data channel announced");
                crate::channels::attach_inbound(&channel, Arc::clone(&router));
            });
        }

        let heartbeat =
            HeartbeatChannel::open(&handle, self.config.heartbeat_interval(), router).await?;

        for track in media.tracks {
            handle.add_track(track).await?;
        }

        resources.handle = Some(Arc::clone(&handle));
        resources.heartbeat = Some(heartbeat);

        Ok(Some(handle))
    }

    /// Wire the inbound routing: results through the dispatcher, metrics to
    /// the observer. The dispatcher reads the callback cells at delivery
    /// time, keeping only a non-owning reference to them.
    fn build_router(&self) -> InboundRouter {
        let callbacks = Arc::clone(&self.callbacks);
        let result_cb: ResultCallback = Arc::new(move |result| {
            let cb = callbacks.on_result.lock().unwrap().clone();
            if let Some(cb) = cb {
                cb(result);
            }
        });

        let callbacks = Arc::clone(&self.callbacks);
        let decode_cb: DecodeFailureCallback = Arc::new(move |detail| {
            let cb = callbacks.on_decode_failure.lock().unwrap().clone();
            if let Some(cb) = cb {
                cb(detail);
            }
        });

        let dispatcher = Arc::new(ResultDispatcher::new(result_cb).with_decode_observer(decode_cb));

        let callbacks = Arc::clone(&self.callbacks);
        let metrics_cb: MetricsCallback = Arc::new(move |text| {
            let cb = callbacks.on_metrics.lock().unwrap().clone();
            if let Some(cb) = cb {
                cb(text);
            }
        });

        InboundRouter::new(dispatcher, Some(metrics_cb))
    }

    /// Transport event observer: forwards every change to the caller, and
    /// tears the session down through the Disconnected path when an
    /// established connection ends. Negotiation-phase transport failures
    /// surface through the negotiator instead.
    fn transport_observer(&self) -> TransportEventCallback {
        let state = Arc::clone(&self.state);
        let resources = Arc::clone(&self.resources);
        let callbacks = Arc::clone(&self.callbacks);
        let grace = self.config.teardown_grace();

        Arc::new(move |event| {
            if let Some(cb) = callbacks.on_transport_event.lock().unwrap().clone() {
                cb(event);
            }

            if let TransportEvent::Connection(
                RTCPeerConnectionState::Disconnected
                | RTCPeerConnectionState::Failed
                | RTCPeerConnectionState::Closed,
            ) = event
            {
                let state = Arc::clone(&state);
                let resources = Arc::clone(&resources);
                let callbacks = Arc::clone(&callbacks);
                tokio::spawn(async move {
                    if *state.read().await != SessionState::Connected {
                        return;
                    }
                    Self::transition(&state, &callbacks, SessionState::Disconnected).await;
                    Self::release(&resources, grace).await;
                    Self::transition(&state, &callbacks, SessionState::Closed).await;
                });
            }
        })
    }

    /// Terminal failure: report once, release everything, close
    async fn fail(&self, err: Error) -> Result<()> {
        warn!(session_id = %self.session_id, "session failed: {}", err);

        let cb = self.callbacks.on_error.lock().unwrap().clone();
        if let Some(cb) = cb {
            cb(&err);
        }

        Self::release(&self.resources, self.config.teardown_grace()).await;
        Self::transition(&self.state, &self.callbacks, SessionState::Closed).await;

        Err(err)
    }

    async fn transition(
        state: &RwLock<SessionState>,
        callbacks: &SessionCallbacks,
        next: SessionState,
    ) {
        {
            let mut guard = state.write().await;
            if *guard == next {
                return;
            }
            debug!("session state {:?} -> {:?}", *guard, next);
            *guard = next;
        }
        Self::emit_state(callbacks, next);
    }

    fn emit_state(callbacks: &SessionCallbacks, next: SessionState) {
        let cb = callbacks.on_state_change.lock().unwrap().clone();
        if let Some(cb) = cb {
            cb(next);
        }
    }

    /// Ordered, best-effort teardown of the owned resources.
    ///
    /// Takes everything out of the resource struct first, so a second caller
    /// finds nothing left and the whole sequence runs at most once per
    /// acquired resource. Closing the transport before its channels and
    /// tracks are stopped can truncate outbound close signaling to the
    /// remote peer, hence the fixed order and the grace delay.
    async fn release(resources: &Mutex<OwnedResources>, grace: Duration) {
        let (handle, heartbeat) = {
            let mut owned = resources.lock().await;
            (owned.handle.take(), owned.heartbeat.take())
        };

        if handle.is_none() && heartbeat.is_none() {
            return;
        }

        // 1. Heartbeat timer first, before the channel underneath it goes away.
        if let Some(heartbeat) = &heartbeat {
            heartbeat.cancel_timer();
        }

        if let Some(handle) = &handle {
            // 2. Transceivers.
            for transceiver in handle.transceivers().await {
                if let Err(e) = transceiver.stop().await {
                    warn!("failed to stop transceiver: {}", e);
                }
            }

            // 3. Local media attached to each sender.
            for sender in handle.senders().await {
                if let Err(e) = sender.stop().await {
                    warn!("failed to stop sender: {}", e);
                }
            }
        }

        // 4. Control channel.
        if let Some(heartbeat) = &heartbeat {
            if let Err(e) = heartbeat.close().await {
                warn!("failed to close control channel: {}", e);
            }
        }

        // 5. Let in-flight close frames flush, then drop the transport.
        tokio::time::sleep(grace).await;

        if let Some(handle) = handle {
            if let Err(e) = handle.close().await {
                warn!("failed to close peer transport: {}", e);
            }
        }
    }
}
