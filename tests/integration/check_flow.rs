//! Release discovery through `Updater::check`.

use bundle_updater::core::UpdateError;
use bundle_updater::test_utils::release_json_flags;
use bundle_updater::upgrade::{CheckOutcome, CheckTrigger, UpdateStatus};

use super::common::Harness;

#[tokio::test]
async fn test_newer_release_is_available() {
    let mut harness = Harness::new();
    harness.publish("v2.1.0");
    let updater = harness.build();

    let outcome = updater.check(CheckTrigger::Manual).await;
    let CheckOutcome::UpdateAvailable(release) = outcome else {
        panic!("expected an update, got {outcome:?}");
    };
    assert_eq!(release.version, "2.1.0");
    assert_eq!(release.asset_name.as_deref(), Some("Editor.zip"));

    let status = updater.status();
    assert_eq!(status.status, UpdateStatus::UpdateAvailable);
    assert_eq!(status.release.map(|r| r.version).as_deref(), Some("2.1.0"));

    let state = updater.state().await.unwrap();
    assert_eq!(state.etag.as_deref(), Some("\"etag-1\""));
    assert_eq!(state.consecutive_failures, 0);
    assert!(state.last_checked_at.is_some());
}

#[tokio::test]
async fn test_same_version_is_up_to_date() {
    let mut harness = Harness::new();
    harness.publish("v2.0.0");
    let updater = harness.build();

    assert_eq!(updater.check(CheckTrigger::Manual).await, CheckOutcome::UpToDate);
    assert_eq!(updater.status().status, UpdateStatus::UpToDate);
}

#[tokio::test]
async fn test_not_modified_serves_cached_release() {
    let mut harness = Harness::new();
    harness.publish("v2.1.0");
    harness.transport.push_status(304);
    let updater = harness.build();

    assert!(matches!(updater.check(CheckTrigger::Manual).await, CheckOutcome::UpdateAvailable(_)));
    let outcome = updater.check(CheckTrigger::Manual).await;
    assert!(matches!(outcome, CheckOutcome::UpdateAvailable(ref r) if r.version == "2.1.0"));

    let requests = harness.transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(!requests[0].headers.iter().any(|(name, _)| name == "If-None-Match"));
    assert!(
        requests[1]
            .headers
            .iter()
            .any(|(name, value)| name == "If-None-Match" && value == "\"etag-1\"")
    );
}

#[tokio::test]
async fn test_not_modified_without_cache_fails() {
    let mut harness = Harness::new();
    harness.transport.push_status(304);
    let updater = harness.build();

    assert_eq!(
        updater.check(CheckTrigger::Manual).await,
        CheckOutcome::Failed(UpdateError::MissingCachedRelease)
    );
    let status = updater.status();
    assert_eq!(status.status, UpdateStatus::Failed);
    assert_eq!(status.last_error, Some(UpdateError::MissingCachedRelease));
    assert!(updater.state().await.unwrap().etag.is_none());
}

#[tokio::test]
async fn test_draft_is_never_offered() {
    let mut harness = Harness::new();
    harness.transport.push_json(200, &release_json_flags("v9.0.0", "", true, false), None);
    let updater = harness.build();

    let outcome = updater.check(CheckTrigger::Manual).await;
    assert!(matches!(outcome, CheckOutcome::Failed(UpdateError::DraftRejected { .. })));
    assert_eq!(updater.status().status, UpdateStatus::Failed);
    assert!(updater.state().await.unwrap().cached_release.is_none());
}

#[tokio::test]
async fn test_prerelease_is_never_offered() {
    let mut harness = Harness::new();
    harness.transport.push_json(200, &release_json_flags("v9.0.0-beta.1", "", false, true), None);
    let updater = harness.build();

    let outcome = updater.check(CheckTrigger::Automatic).await;
    assert!(matches!(outcome, CheckOutcome::Failed(UpdateError::PrereleaseRejected { .. })));
    assert!(updater.status().release.is_none());
}

#[tokio::test]
async fn test_foreign_asset_host_is_rejected() {
    let mut harness = Harness::new();
    let body = release_json_flags("v2.1.0", "", false, false)
        .replace("https://github.com/acme/editor/releases/download", "https://evil.example.com/acme/editor/releases/download");
    harness.transport.push_json(200, &body, None);
    let updater = harness.build();

    let outcome = updater.check(CheckTrigger::Manual).await;
    assert!(matches!(outcome, CheckOutcome::Failed(UpdateError::InvalidReleaseSource { .. })));
}

#[tokio::test]
async fn test_skip_and_remind_only_silence_automatic_checks() {
    let mut harness = Harness::new();
    for _ in 0..4 {
        harness.publish("v2.1.0");
    }
    let updater = harness.build();

    updater.check(CheckTrigger::Manual).await;
    assert_eq!(updater.skip_version().await.unwrap().as_deref(), Some("2.1.0"));
    assert!(matches!(updater.check(CheckTrigger::Automatic).await, CheckOutcome::Suppressed(_)));
    assert!(matches!(updater.check(CheckTrigger::Manual).await, CheckOutcome::UpdateAvailable(_)));

    updater.clear_deferrals().await.unwrap();
    updater.remind_later(std::time::Duration::from_secs(3600)).await.unwrap();
    assert!(matches!(updater.check(CheckTrigger::Automatic).await, CheckOutcome::Suppressed(_)));
    assert_eq!(updater.status().status, UpdateStatus::Idle);
}
