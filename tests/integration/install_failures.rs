//! Failed installs keep the installed bundle and fall back to the release page.

use bundle_updater::core::UpdateError;
use bundle_updater::test_utils::{FailingMover, FakeExtractor, FakeSigning, checksum_notes, release_json};
use bundle_updater::upgrade::{CheckTrigger, InstallMode, UpdateStatus};
use std::sync::Arc;

use super::common::{Harness, TEAM, backups, marker, work_dirs};

const RELEASE_PAGE: &str = "https://github.com/acme/editor/releases/tag/v2.1.0";

fn assert_untouched(harness: &Harness) {
    assert_eq!(marker(&harness.install_path), "old");
    assert!(backups(&harness.install_path).is_empty());
    assert!(work_dirs(&harness.install_path).is_empty());
}

#[tokio::test]
async fn test_checksum_mismatch_never_unpacks() {
    let mut harness = Harness::new();
    harness.publish_with_notes("v2.1.0", &checksum_notes("Editor.zip", b"some other archive"));
    let updater = harness.build();

    updater.check(CheckTrigger::Manual).await;
    let err = updater.install(InstallMode::Interactive).await.unwrap_err();

    assert!(matches!(err, UpdateError::ChecksumMismatch { .. }));
    assert_eq!(harness.extractor.calls(), 0);
    assert_untouched(&harness);

    let status = updater.status();
    assert_eq!(status.status, UpdateStatus::Failed);
    assert!(!status.install.is_installing);
    assert!(matches!(status.last_error, Some(UpdateError::ChecksumMismatch { .. })));
    assert_eq!(harness.shell.opened_urls(), vec![RELEASE_PAGE.to_string()]);
}

#[tokio::test]
async fn test_missing_checksum_is_fatal() {
    let mut harness = Harness::new();
    harness.publish_with_notes("v2.1.0", "## Changes\n\n- Faster startup\n");
    let updater = harness.build();

    updater.check(CheckTrigger::Manual).await;
    let err = updater.install(InstallMode::Interactive).await.unwrap_err();

    assert_eq!(
        err,
        UpdateError::ChecksumMissing {
            asset: "Editor.zip".to_string()
        }
    );
    assert_eq!(harness.extractor.calls(), 0);
    assert_untouched(&harness);
}

#[tokio::test]
async fn test_foreign_signing_team_is_rejected() {
    let mut harness = Harness::new()
        .with_signing(|running| FakeSigning::matching(running, TEAM).with_candidate_team("EVIL0000"));
    harness.publish("v2.1.0");
    let updater = harness.build();

    updater.check(CheckTrigger::Manual).await;
    let err = updater.install(InstallMode::Interactive).await.unwrap_err();

    assert!(matches!(err, UpdateError::InvalidCodeSignature { .. }));
    assert_eq!(harness.extractor.calls(), 1);
    assert_untouched(&harness);
}

#[tokio::test]
async fn test_invalid_signature_is_rejected() {
    let mut harness =
        Harness::new().with_signing(|running| FakeSigning::matching(running, TEAM).with_invalid_candidate());
    harness.publish("v2.1.0");
    let updater = harness.build();

    updater.check(CheckTrigger::Manual).await;
    let err = updater.install(InstallMode::Interactive).await.unwrap_err();

    assert!(matches!(err, UpdateError::InvalidCodeSignature { .. }));
    assert_untouched(&harness);
}

#[tokio::test]
async fn test_extraction_failure_keeps_bundle() {
    let mut harness = Harness::new().with_extractor(FakeExtractor::failing());
    harness.publish("v2.1.0");
    let updater = harness.build();

    updater.check(CheckTrigger::Manual).await;
    assert!(updater.install(InstallMode::Interactive).await.is_err());
    assert_untouched(&harness);
}

#[tokio::test]
async fn test_failed_move_in_rolls_back() {
    let mover = Arc::new(FailingMover::fail_on_call(2));
    let mut harness = Harness::new().with_mover(mover.clone());
    harness.publish("v2.1.0");
    let updater = harness.build();

    updater.check(CheckTrigger::Manual).await;
    let err = updater.install(InstallMode::Interactive).await.unwrap_err();

    assert!(matches!(err, UpdateError::InstallUnsupported { .. }));
    // aside, in (fails), restore
    assert_eq!(mover.calls(), 3);
    assert_untouched(&harness);
    assert!(harness.shell.relaunched().is_empty());
    assert_eq!(harness.shell.opened_urls(), vec![RELEASE_PAGE.to_string()]);
}

#[tokio::test]
async fn test_failed_move_aside_changes_nothing() {
    let mover = Arc::new(FailingMover::fail_on_call(1));
    let mut harness = Harness::new().with_mover(mover.clone());
    harness.publish("v2.1.0");
    let updater = harness.build();

    updater.check(CheckTrigger::Manual).await;
    assert!(updater.install(InstallMode::Interactive).await.is_err());
    assert_eq!(mover.calls(), 1);
    assert_untouched(&harness);
}

#[tokio::test]
async fn test_failed_download_reports_http_status() {
    let mut harness = Harness::new();
    let notes = checksum_notes("Editor.zip", b"x");
    harness.transport.push_json(200, &release_json("v2.1.0", &notes), None);
    let updater = harness.build();

    updater.check(CheckTrigger::Manual).await;
    let err = updater.install(InstallMode::Interactive).await.unwrap_err();

    assert!(matches!(err, UpdateError::Http { status: 404, .. }));
    assert_eq!(harness.extractor.calls(), 0);
    assert_untouched(&harness);
}

#[tokio::test]
async fn test_install_without_release_fails() {
    let mut harness = Harness::new();
    let updater = harness.build();

    assert_eq!(updater.install(InstallMode::Interactive).await.unwrap_err(), UpdateError::NoDownloadAsset);
    assert_untouched(&harness);
}
