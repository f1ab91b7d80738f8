#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fileconv_client::reconnect::ReconnectConfig;
use fileconv_client::{ApiClient, ChannelConfig};

pub const CLIENT_ID: &str = "c-1";
pub const CLIENT_COOKIE: &str = "client_id=c-1";

pub fn test_api(server: &MockServer) -> ApiClient {
    ApiClient::new(server.uri(), Duration::from_secs(5)).expect("client builds")
}

pub async fn mount_identity(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/client-id"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "client_id generated", "client_id": CLIENT_ID })),
        )
        .mount(server)
        .await;
}

pub async fn mount_listing(server: &MockServer, files: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/documents/files"))
        .and(header("cookie", CLIENT_COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "client_id": CLIENT_ID,
            "count": files.as_array().map_or(0, |f| f.len()),
            "files": files,
            "has_more": false
        })))
        .mount(server)
        .await;
}

pub async fn mount_accepting_upload(server: &MockServer, job_id: &str, delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/documents/upload"))
        .and(header("cookie", CLIENT_COOKIE))
        .respond_with(
            ResponseTemplate::new(202)
                .set_body_json(json!({ "job_id": job_id, "status": "processing", "message": "ok" }))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

pub async fn request_count(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

/// Poll until the server has seen at least `n` requests for `route`.
pub async fn wait_for_requests(server: &MockServer, route: &str, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while request_count(server, route).await < n {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("expected {n} requests to {route}"));
}

pub fn listing_entry(filename: &str, size_bytes: u64) -> serde_json::Value {
    json!({
        "filename": filename,
        "size_bytes": size_bytes,
        "size_mb": 0.0,
        "download_url": format!("http://localhost/documents/download/output/{CLIENT_ID}/{filename}"),
    })
}

/// Push server that sends `frames` to every connection, then keeps it
/// open until the client leaves.
pub async fn start_push_server(frames: Vec<serde_json::Value>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let frames = frames.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                    return;
                };
                for frame in frames {
                    if ws.send(Message::text(frame.to_string())).await.is_err() {
                        return;
                    }
                }
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });

    addr
}

pub fn push_config(addr: SocketAddr) -> ChannelConfig {
    ChannelConfig {
        ws_url: format!("ws://{addr}/ws"),
        reconnect: ReconnectConfig {
            max_attempts: 1,
            delay: Duration::from_millis(50),
        },
    }
}
