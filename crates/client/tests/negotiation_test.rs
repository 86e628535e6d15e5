//! Signaling handshake paths against local stub servers

mod harness;

use async_trait::async_trait;
use rppg_client::{
    Error, MediaSource, NegotiationError, RppgSession, SessionConfig, SessionState,
    StaticTokenProvider, SyntheticMediaSource, TokenProvider,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

fn session_for(addr: SocketAddr) -> RppgSession {
    let mut config = SessionConfig::new(format!("http://{}", addr));
    config.teardown_grace_ms = 10;
    RppgSession::new(
        config,
        Arc::new(StaticTokenProvider::new("test-token")),
        Arc::new(SyntheticMediaSource::default()),
    )
}

#[tokio::test]
async fn signaling_http_500_is_terminal() {
    let addr = harness::spawn_status_server(500).await;
    let session = session_for(addr);

    let states: Arc<Mutex<Vec<SessionState>>> = Arc::new(Mutex::new(Vec::new()));
    let states_cb = Arc::clone(&states);
    session.on_state_change(move |state| states_cb.lock().unwrap().push(state));

    let err = session.start().await.unwrap_err();
    assert!(
        matches!(
            err,
            Error::Negotiation(NegotiationError::SignalingHttp { status: 500 })
        ),
        "got {:?}",
        err
    );

    assert_eq!(session.state().await, SessionState::Closed);
    // Never passed through Connected or Disconnected.
    assert_eq!(
        *states.lock().unwrap(),
        vec![SessionState::Negotiating, SessionState::Closed]
    );
}

#[tokio::test]
async fn malformed_answer_is_terminal() {
    let addr = harness::spawn_body_server(200, "surprise, not json".to_string()).await;
    let session = session_for(addr);

    let err = session.start().await.unwrap_err();
    assert!(
        matches!(err, Error::Negotiation(NegotiationError::MalformedAnswer(_))),
        "got {:?}",
        err
    );
    assert_eq!(session.state().await, SessionState::Closed);
}

#[tokio::test]
async fn auth_failure_is_terminal() {
    struct NoTokens;

    #[async_trait]
    impl TokenProvider for NoTokens {
        async fn token(&self) -> anyhow::Result<String> {
            anyhow::bail!("token service down")
        }
    }

    let addr = harness::spawn_status_server(200).await;
    let mut config = SessionConfig::new(format!("http://{}", addr));
    config.teardown_grace_ms = 10;
    let session = RppgSession::new(
        config,
        Arc::new(NoTokens),
        Arc::new(SyntheticMediaSource::default()),
    );

    let err = session.start().await.unwrap_err();
    assert!(
        matches!(err, Error::Negotiation(NegotiationError::AuthFailure(_))),
        "got {:?}",
        err
    );
    assert_eq!(session.state().await, SessionState::Closed);
}

#[tokio::test]
async fn successful_handshake_connects_then_stops_clean() {
    let addr = harness::spawn_answering_server().await;
    let session = session_for(addr);

    let states: Arc<Mutex<Vec<SessionState>>> = Arc::new(Mutex::new(Vec::new()));
    let states_cb = Arc::clone(&states);
    session.on_state_change(move |state| states_cb.lock().unwrap().push(state));

    session.start().await.unwrap();
    assert_eq!(session.state().await, SessionState::Connected);

    session.stop().await;
    assert_eq!(session.state().await, SessionState::Closed);

    assert_eq!(
        *states.lock().unwrap(),
        vec![
            SessionState::Negotiating,
            SessionState::Connected,
            SessionState::Disconnected,
            SessionState::Closed,
        ]
    );
}

#[tokio::test]
async fn audio_constraint_adds_second_track() {
    // The handshake carries whatever tracks were acquired; audio on top of
    // video still negotiates.
    let addr = harness::spawn_answering_server().await;
    let mut config = SessionConfig::new(format!("http://{}", addr));
    config.teardown_grace_ms = 10;
    config.media.audio = true;

    let session = RppgSession::new(
        config,
        Arc::new(StaticTokenProvider::new("test-token")),
        Arc::new(SyntheticMediaSource::default()),
    );

    session.start().await.unwrap();
    assert_eq!(session.state().await, SessionState::Connected);
    session.stop().await;
}

struct CountingSource {
    inner: SyntheticMediaSource,
    calls: Arc<Mutex<usize>>,
}

#[async_trait]
impl MediaSource for CountingSource {
    async fn acquire(
        &self,
        constraints: &rppg_client::MediaConstraints,
    ) -> anyhow::Result<rppg_client::LocalMedia> {
        *self.calls.lock().unwrap() += 1;
        self.inner.acquire(constraints).await
    }
}

#[tokio::test]
async fn media_acquired_once_per_start() {
    let addr = harness::spawn_status_server(500).await;
    let calls = Arc::new(Mutex::new(0usize));

    let mut config = SessionConfig::new(format!("http://{}", addr));
    config.teardown_grace_ms = 10;
    let session = RppgSession::new(
        config,
        Arc::new(StaticTokenProvider::new("test-token")),
        Arc::new(CountingSource {
            inner: SyntheticMediaSource::default(),
            calls: Arc::clone(&calls),
        }),
    );

    let _ = session.start().await;
    assert_eq!(*calls.lock().unwrap(), 1);
}
