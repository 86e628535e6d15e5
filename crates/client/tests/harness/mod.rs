//! Stub signaling servers for integration tests
//!
//! Hand-rolled HTTP/1.1 on a TcpListener: each test needs exactly one
//! request/response shape, not a web framework.

#![allow(dead_code)]

use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Server answering every request with the given status and an empty body
pub async fn spawn_status_server(status: u16) -> SocketAddr {
    spawn_body_server(status, String::new()).await
}

/// Server answering every request with the given status and body
pub async fn spawn_body_server(status: u16, body: String) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let body = body.clone();
            tokio::spawn(async move {
                let _ = read_http_request(&mut stream).await;
                let _ = write_http_response(&mut stream, status, &body).await;
            });
        }
    });

    addr
}

/// Server that accepts connections and reads requests but never responds
pub async fn spawn_blackhole_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = read_http_request(&mut stream).await;
                // hold the connection open without answering
                tokio::time::sleep(std::time::Duration::from_secs(600)).await;
            });
        }
    });

    addr
}

/// Server implementing the real /offer contract: it parses the posted offer,
/// answers it with a local WebRTC peer, and returns `{sdp, type}`.
/// Requests without a bearer token get a 401.
pub async fn spawn_answering_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(answer_offer(stream));
        }
    });

    addr
}

async fn answer_offer(mut stream: TcpStream) {
    let (head, body) = read_http_request(&mut stream).await;

    if !head.to_ascii_lowercase().contains("authorization: bearer ") {
        let _ = write_http_response(&mut stream, 401, "").await;
        return;
    }

    let offer: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let sdp = offer["sdp"].as_str().unwrap().to_string();
    assert_eq!(offer["type"], "offer");
    assert_eq!(offer["video_transform"], "mask");

    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs().unwrap();
    let registry = register_default_interceptors(Default::default(), &mut media_engine).unwrap();
    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();
    let pc = api
        .new_peer_connection(RTCConfiguration::default())
        .await
        .unwrap();

    pc.set_remote_description(RTCSessionDescription::offer(sdp).unwrap())
        .await
        .unwrap();

    let answer = pc.create_answer(None).await.unwrap();
    let mut gathered = pc.gathering_complete_promise().await;
    pc.set_local_description(answer).await.unwrap();
    let _ = gathered.recv().await;

    let local = pc.local_description().await.unwrap();
    let body = serde_json::json!({
        "sdp": local.sdp,
        "type": local.sdp_type.to_string(),
    })
    .to_string();

    let _ = write_http_response(&mut stream, 200, &body).await;
}

/// Read one HTTP request; returns (head, body)
pub async fn read_http_request(stream: &mut TcpStream) -> (String, Vec<u8>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        if n == 0 {
            break buf.len();
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();

    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    (head, buf[header_end..].to_vec())
}

async fn write_http_response(
    stream: &mut TcpStream,
    status: u16,
    body: &str,
) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
