#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fileconv_client::{ApiClient, IdentityBootstrapper};

/// Identity the mocked identity endpoint hands out.
pub const CLIENT_ID: &str = "c-1";

/// Cookie every scoped request must carry.
pub const CLIENT_COOKIE: &str = "client_id=c-1";

/// Build an API client pointed at the mock server.
pub fn test_api(server: &MockServer) -> ApiClient {
    ApiClient::new(server.uri(), Duration::from_secs(5)).expect("client builds")
}

pub fn test_identity(server: &MockServer) -> Arc<IdentityBootstrapper> {
    Arc::new(IdentityBootstrapper::new(test_api(server)))
}

/// Mount a successful identity endpoint expected to be hit `calls` times.
pub async fn mount_identity(server: &MockServer, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/client-id"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "client_id generated", "client_id": CLIENT_ID })),
        )
        .expect(calls)
        .mount(server)
        .await;
}

/// Mount a failing identity endpoint.
pub async fn mount_identity_failure(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/auth/client-id"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Mount a listing endpoint answering with `body`.
pub async fn mount_listing(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/documents/files"))
        .and(header("cookie", CLIENT_COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Number of requests the server received for `route`.
pub async fn request_count(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

pub fn listing_entry(filename: &str, size_bytes: u64) -> serde_json::Value {
    json!({
        "filename": filename,
        "size_bytes": size_bytes,
        "size_mb": 0.0,
        "download_url": format!("http://localhost/documents/download/output/{CLIENT_ID}/{filename}"),
        "extension": filename.rsplit('.').next().map(|e| e.to_uppercase()),
    })
}
