//! Job submission against a mocked conversion service.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fileconv_client::{ApiClient, IdentityBootstrapper, JobSubmitter, SubmitOutcome};
use fileconv_core::conversion::ConversionType;
use fileconv_core::error::ConversionError;
use fileconv_core::files::SourceFile;
use fileconv_core::notice::{Notice, NoticeLevel};
use fileconv_events::EventBus;

use common::{mount_identity, mount_identity_failure, test_api, CLIENT_COOKIE};

fn report_csv() -> SourceFile {
    SourceFile::new("report.csv", b"name,total\nacme,42\n".to_vec())
}

fn submitter_with(api: ApiClient) -> (JobSubmitter, Arc<EventBus<Notice>>) {
    let notices = Arc::new(EventBus::default());
    let identity = Arc::new(IdentityBootstrapper::new(api.clone()));
    (JobSubmitter::new(api, identity, Arc::clone(&notices)), notices)
}

async fn mount_upload(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/documents/upload"))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn accepted_upload_returns_job_handle() {
    let server = MockServer::start().await;
    mount_identity(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/documents/upload"))
        .and(header("cookie", CLIENT_COOKIE))
        .and(body_string_contains("csv_to_xlsx"))
        .and(body_string_contains("report.csv"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "job_id": "abc",
            "status": "processing",
            "message": "ok"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (submitter, notices) = submitter_with(test_api(&server));
    let mut notice_sub = notices.subscribe();

    let result = submitter
        .submit(&report_csv(), ConversionType::CsvToXlsx)
        .await;

    let outcome = SubmitOutcome::from(&result);
    assert!(outcome.success);
    assert_eq!(outcome.job_id.as_deref(), Some("abc"));

    let handle = result.unwrap();
    assert_eq!(handle.initial_status, "processing");
    assert_eq!(handle.server_message, "ok");

    let notice = notice_sub.try_recv().expect("acceptance notice");
    assert_eq!(notice.level, NoticeLevel::Success);
}

#[tokio::test]
async fn illegal_conversion_never_touches_the_network() {
    let server = MockServer::start().await;
    let (submitter, notices) = submitter_with(test_api(&server));
    let mut notice_sub = notices.subscribe();

    let result = submitter
        .submit(&report_csv(), ConversionType::PdfToText)
        .await;

    assert!(result.as_ref().is_err_and(|e| e.is_local()));
    assert_matches!(result, Err(ConversionError::Validation(_)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
    assert_eq!(
        notice_sub.try_recv().map(|n| n.level),
        Some(NoticeLevel::Error)
    );
}

#[tokio::test]
async fn identity_failure_is_session_error_without_upload() {
    let server = MockServer::start().await;
    mount_identity_failure(&server, 500).await;
    Mock::given(method("POST"))
        .and(path("/documents/upload"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;

    let (submitter, _notices) = submitter_with(test_api(&server));

    let result = submitter
        .submit(&report_csv(), ConversionType::CsvToJson)
        .await;

    assert_eq!(result, Err(ConversionError::Session));
}

#[tokio::test]
async fn accepted_without_job_id_is_failure() {
    let server = MockServer::start().await;
    mount_identity(&server, 1).await;
    mount_upload(
        &server,
        ResponseTemplate::new(202).set_body_json(json!({ "status": "pending", "message": "" })),
    )
    .await;

    let (submitter, _notices) = submitter_with(test_api(&server));
    let result = submitter
        .submit(&report_csv(), ConversionType::CsvToJson)
        .await;

    assert_matches!(result, Err(ConversionError::Protocol(_)));
    assert!(!SubmitOutcome::from(&result).success);
}

#[tokio::test]
async fn ok_instead_of_accepted_is_failure() {
    let server = MockServer::start().await;
    mount_identity(&server, 1).await;
    mount_upload(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "job_id": "abc",
            "status": "done",
            "message": "Converted synchronously"
        })),
    )
    .await;

    let (submitter, _notices) = submitter_with(test_api(&server));
    let result = submitter
        .submit(&report_csv(), ConversionType::CsvToJson)
        .await;

    assert_eq!(
        result,
        Err(ConversionError::Protocol("Converted synchronously".into()))
    );
}

#[tokio::test]
async fn bad_request_about_session_has_distinct_message() {
    let server = MockServer::start().await;
    mount_identity(&server, 1).await;
    mount_upload(
        &server,
        ResponseTemplate::new(400).set_body_json(json!({
            "code": 400,
            "errors": { "cookie": "client_id cookie is required" }
        })),
    )
    .await;

    let (submitter, _notices) = submitter_with(test_api(&server));
    let err = submitter
        .submit(&report_csv(), ConversionType::CsvToJson)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Session not identified. Try again.");
}

#[tokio::test]
async fn generic_bad_request_uses_server_message() {
    let server = MockServer::start().await;
    mount_identity(&server, 1).await;
    mount_upload(
        &server,
        ResponseTemplate::new(400).set_body_json(json!({ "message": "Unsupported file format" })),
    )
    .await;

    let (submitter, _notices) = submitter_with(test_api(&server));
    let err = submitter
        .submit(&report_csv(), ConversionType::CsvToJson)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ConversionError::Server {
            status: 400,
            message: "Unsupported file format".into()
        }
    );
}

#[tokio::test]
async fn forbidden_is_quota_or_access_denied() {
    let server = MockServer::start().await;
    mount_identity(&server, 1).await;
    mount_upload(
        &server,
        ResponseTemplate::new(403).set_body_json(json!({ "errors": { "upload": "quota" } })),
    )
    .await;

    let (submitter, _notices) = submitter_with(test_api(&server));
    let err = submitter
        .submit(&report_csv(), ConversionType::CsvToJson)
        .await
        .unwrap_err();

    assert_matches!(err, ConversionError::Server { status: 403, .. });
    assert_eq!(err.to_string(), "Quota limit reached or access denied");
}

#[tokio::test]
async fn server_error_uses_status_when_no_message() {
    let server = MockServer::start().await;
    mount_identity(&server, 1).await;
    mount_upload(&server, ResponseTemplate::new(503)).await;

    let (submitter, _notices) = submitter_with(test_api(&server));
    let err = submitter
        .submit(&report_csv(), ConversionType::CsvToJson)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Server error 503");
}

#[tokio::test]
async fn timeout_is_transport_error() {
    let server = MockServer::start().await;
    mount_identity(&server, 1).await;
    mount_upload(
        &server,
        ResponseTemplate::new(202)
            .set_body_json(json!({ "job_id": "late", "status": "pending", "message": "" }))
            .set_delay(Duration::from_secs(2)),
    )
    .await;

    let api = ApiClient::new(server.uri(), Duration::from_millis(300)).unwrap();
    let (submitter, notices) = submitter_with(api);
    let mut notice_sub = notices.subscribe();

    let result = submitter
        .submit(&report_csv(), ConversionType::CsvToJson)
        .await;

    assert_eq!(result, Err(ConversionError::Transport));
    let notice = notice_sub.try_recv().expect("failure notice");
    assert_eq!(notice.message, ConversionError::Transport.to_string());
}
