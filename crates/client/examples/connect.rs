//! Connect to an rPPG inference server and print incoming results.
//!
//! Usage: connect <signaling-url> [auth-token]
//!
//! The auth token may also be supplied via RPPG_AUTH_TOKEN. Media comes from
//! the synthetic source, so this runs on machines without a camera; wire a
//! real capture pipeline through the MediaSource trait for live inference.

use rppg_client::{RppgSession, SessionConfig, StaticTokenProvider, SyntheticMediaSource};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .unwrap_or_else(|| "http://localhost:8080".to_string());
    let token = args
        .next()
        .or_else(|| std::env::var("RPPG_AUTH_TOKEN").ok())
        .unwrap_or_default();

    let session = RppgSession::new(
        SessionConfig::new(url),
        Arc::new(StaticTokenProvider::new(token)),
        Arc::new(SyntheticMediaSource::default()),
    );

    session.on_state_change(|state| println!("state: {:?}", state));
    session.on_metrics(|text| println!("metrics: {}", text));
    session.on_result(|result| {
        println!(
            "bpm={:?} emotion={:?} shoulder_tilt={:?} neck_tilt={:?}",
            result.bpm, result.emotion, result.shoulder_tilt, result.neck_tilt
        );
    });

    session.start().await?;
    println!("session {} running, ctrl-c to stop", session.session_id());

    tokio::signal::ctrl_c().await?;
    session.stop().await;

    Ok(())
}
