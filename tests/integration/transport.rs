//! `ReqwestTransport` against a local mock server.

use bundle_updater::core::UpdateError;
use bundle_updater::test_utils::{
    FakeExtractor, FakeShell, FakeSigning, TEST_OWNER, TEST_REPO, test_config,
};
use bundle_updater::upgrade::backup::TokioMover;
use bundle_updater::upgrade::installer::InstallTools;
use bundle_updater::upgrade::state::StateStore;
use bundle_updater::upgrade::transport::{HttpRequest, HttpTransport, ReqwestTransport};
use bundle_updater::upgrade::{CheckOutcome, CheckTrigger, Updater};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER_AGENT: &str = "editor-updater-tests/1.0";

fn transport() -> ReqwestTransport {
    ReqwestTransport::new(USER_AGENT, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_get_sends_headers_and_returns_not_modified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/editor/releases/latest"))
        .and(header("user-agent", USER_AGENT))
        .and(header("if-none-match", "\"etag-1\""))
        .respond_with(ResponseTemplate::new(304).insert_header("ETag", "\"etag-1\""))
        .expect(1)
        .mount(&server)
        .await;

    let request = HttpRequest::get(format!("{}/repos/acme/editor/releases/latest", server.uri()))
        .header("If-None-Match", "\"etag-1\"");
    let response = transport().get(&request).await.unwrap();

    assert_eq!(response.status, 304);
    assert_eq!(response.header("etag"), Some("\"etag-1\""));
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_get_passes_error_statuses_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("X-RateLimit-Remaining", "0")
                .insert_header("X-RateLimit-Reset", "1900000000")
                .set_body_string("{\"message\":\"API rate limit exceeded\"}"),
        )
        .mount(&server)
        .await;

    let response = transport().get(&HttpRequest::get(server.uri())).await.unwrap();

    assert_eq!(response.status, 403);
    assert!(!response.is_success());
    assert_eq!(response.header("x-ratelimit-remaining"), Some("0"));
    assert_eq!(response.header("X-RateLimit-Reset"), Some("1900000000"));
}

#[tokio::test]
async fn test_download_streams_to_file_with_progress() {
    let server = MockServer::start().await;
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    Mock::given(method("GET"))
        .and(path("/acme/editor/releases/download/v2.1.0/Editor.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("Editor.zip");
    let seen = Mutex::new(Vec::new());
    let on_progress = |done: u64, total: Option<u64>| seen.lock().unwrap().push((done, total));

    let url = format!("{}/acme/editor/releases/download/v2.1.0/Editor.zip", server.uri());
    let written = transport().download(&url, &dest, &on_progress).await.unwrap();

    assert_eq!(written, payload.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), payload);

    let seen = seen.into_inner().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0].0 < w[1].0));
    assert_eq!(seen.last(), Some(&(payload.len() as u64, Some(payload.len() as u64))));
}

#[tokio::test]
async fn test_download_rejects_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("Editor.zip");
    let url = format!("{}/missing.zip", server.uri());
    let err = transport().download(&url, &dest, &|_: u64, _: Option<u64>| {}).await.unwrap_err();

    assert_eq!(
        err,
        UpdateError::Http {
            status: 404,
            url
        }
    );
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_check_against_loopback_api() {
    let server = MockServer::start().await;
    let body = serde_json::json!({
        "tag_name": "v2.1.0",
        "name": "Editor 2.1.0",
        "body": "Bug fixes",
        "draft": false,
        "prerelease": false,
        "published_at": "2025-06-01T12:00:00Z",
        "html_url": format!("https://github.com/{TEST_OWNER}/{TEST_REPO}/releases/tag/v2.1.0"),
        "url": format!("{}/repos/{TEST_OWNER}/{TEST_REPO}/releases/1001", server.uri()),
        "assets": [{
            "name": "Editor.zip",
            "browser_download_url": format!(
                "https://github.com/{TEST_OWNER}/{TEST_REPO}/releases/download/v2.1.0/Editor.zip"
            )
        }]
    });
    Mock::given(method("GET"))
        .and(path("/repos/acme/editor/releases/latest"))
        .and(header("accept", "application/vnd.github+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body).insert_header("ETag", "W/\"abc\""))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let install_path = temp.path().join("Editor.app");
    let tools = InstallTools {
        transport: Arc::new(transport()),
        extractor: Arc::new(FakeExtractor::new("Editor.app", "new")),
        signing: Arc::new(FakeSigning::matching(&install_path, "TEAM1234")),
        mover: Arc::new(TokioMover),
        shell: Arc::new(FakeShell::default()),
    };
    let config = test_config("2.0.0", &server.uri());
    let updater = Updater::new(&config, install_path, Arc::new(StateStore::in_memory()), tools);

    let outcome = updater.check(CheckTrigger::Manual).await;
    assert!(matches!(outcome, CheckOutcome::UpdateAvailable(ref r) if r.version == "2.1.0"));
    assert_eq!(updater.state().await.unwrap().etag.as_deref(), Some("W/\"abc\""));
}
