//! Successful installs from check to relaunch.

use bundle_updater::upgrade::state::{StateStore, UpdateState};
use bundle_updater::upgrade::{
    CheckOutcome, CheckTrigger, CompletionAction, InstallMode, InstallOutcome, InstallPhase,
};

use super::common::{Harness, asset_url, backups, marker, work_dirs};

#[tokio::test]
async fn test_interactive_update_end_to_end() {
    let mut harness = Harness::new();
    harness.publish("v2.1.0");
    let updater = harness.build();
    let mut status = updater.subscribe();

    assert!(matches!(updater.check(CheckTrigger::Manual).await, CheckOutcome::UpdateAvailable(_)));

    let outcome = updater.install(InstallMode::Interactive).await.unwrap();
    let InstallOutcome::AwaitingCompletion {
        backup,
    } = outcome
    else {
        panic!("interactive install should wait for the user");
    };

    assert_eq!(marker(&harness.install_path), "new");
    assert_eq!(marker(&backup), "old");
    assert_eq!(backups(&harness.install_path), vec![backup.clone()]);
    assert!(work_dirs(&harness.install_path).is_empty());
    assert!(
        backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("Editor.app.backup-")
    );
    assert_eq!(harness.transport.download_calls(), 1);
    assert_eq!(harness.extractor.calls(), 1);

    let snapshot = status.borrow_and_update().clone();
    assert!(snapshot.install.awaiting_completion_action);
    assert!(!snapshot.install.is_installing);
    assert_eq!(snapshot.install.phase, InstallPhase::Complete);
    assert!((snapshot.install.progress - 1.0).abs() < f64::EPSILON);

    // Nothing relaunches until the user decides.
    assert!(harness.shell.relaunched().is_empty());
    assert!(harness.shell.terminated().is_empty());

    updater.complete(CompletionAction::RestartNow).unwrap();
    assert_eq!(harness.shell.relaunched(), vec![harness.install_path.clone()]);
    assert_eq!(harness.shell.terminated(), vec![0]);
    assert!(harness.shell.opened_urls().is_empty());
}

#[tokio::test]
async fn test_close_now_exits_without_relaunch() {
    let mut harness = Harness::new();
    harness.publish("v2.1.0");
    let updater = harness.build();

    updater.check(CheckTrigger::Manual).await;
    updater.install(InstallMode::Interactive).await.unwrap();
    updater.complete(CompletionAction::CloseNow).unwrap();

    assert!(harness.shell.relaunched().is_empty());
    assert_eq!(harness.shell.terminated(), vec![0]);
}

#[tokio::test]
async fn test_second_install_refused_while_awaiting_completion() {
    let mut harness = Harness::new();
    harness.publish("v2.1.0");
    let updater = harness.build();

    updater.check(CheckTrigger::Manual).await;
    updater.install(InstallMode::Interactive).await.unwrap();
    assert!(updater.install(InstallMode::Interactive).await.is_err());
    assert_eq!(harness.transport.download_calls(), 1);
}

#[tokio::test]
async fn test_auto_download_installs_and_relaunches() {
    let prefs = UpdateState {
        auto_download_enabled: true,
        ..Default::default()
    };
    let mut harness = Harness::new().with_store(StateStore::with_state(prefs));
    harness.publish("v2.1.0");
    let updater = harness.build();

    let outcome = updater.check(CheckTrigger::Automatic).await;
    assert!(matches!(outcome, CheckOutcome::UpdateAvailable(ref r) if r.version == "2.1.0"));

    assert_eq!(marker(&harness.install_path), "new");
    assert_eq!(harness.shell.relaunched(), vec![harness.install_path.clone()]);
    assert_eq!(harness.shell.terminated(), vec![0]);
    assert!(!updater.status().install.awaiting_completion_action);
}

#[tokio::test]
async fn test_auto_download_honours_skipped_version() {
    let prefs = UpdateState {
        auto_download_enabled: true,
        skipped_version: Some("2.1.0".to_string()),
        ..Default::default()
    };
    let mut harness = Harness::new().with_store(StateStore::with_state(prefs));
    harness.publish("v2.1.0");
    let updater = harness.build();

    let outcome = updater.check(CheckTrigger::Automatic).await;
    assert!(matches!(outcome, CheckOutcome::Suppressed(ref r) if r.version == "2.1.0"));

    assert_eq!(marker(&harness.install_path), "old");
    assert_eq!(harness.transport.download_calls(), 0);
    assert!(harness.shell.relaunched().is_empty());
    assert!(harness.shell.terminated().is_empty());
}

#[tokio::test]
async fn test_auto_download_waits_for_remind_later() {
    let prefs = UpdateState {
        auto_download_enabled: true,
        remind_until: Some(chrono::Utc::now() + chrono::Duration::hours(4)),
        ..Default::default()
    };
    let mut harness = Harness::new().with_store(StateStore::with_state(prefs));
    harness.publish("v2.1.0");
    let updater = harness.build();

    assert!(matches!(updater.check(CheckTrigger::Automatic).await, CheckOutcome::Suppressed(_)));
    assert_eq!(marker(&harness.install_path), "old");
    assert_eq!(harness.transport.download_calls(), 0);
}

#[tokio::test]
async fn test_install_uses_cached_release_after_restart() {
    let mut harness = Harness::new();
    harness.publish("v2.1.0");
    let updater = harness.build();
    updater.check(CheckTrigger::Manual).await;
    let cached = updater.state().await.unwrap();
    drop(updater);

    let mut restarted = Harness::new().with_store(StateStore::with_state(cached));
    restarted.transport.set_download(&asset_url("v2.1.0"), super::common::ARCHIVE_BYTES.to_vec());
    let updater = restarted.build();

    assert!(updater.status().release.is_none());
    assert!(matches!(
        updater.install(InstallMode::Interactive).await.unwrap(),
        InstallOutcome::AwaitingCompletion { .. }
    ));
    assert_eq!(marker(&restarted.install_path), "new");
}

#[tokio::test]
async fn test_rollback_restores_previous_bundle() {
    let mut harness = Harness::new();
    harness.publish("v2.1.0");
    let updater = harness.build();

    updater.check(CheckTrigger::Manual).await;
    updater.install(InstallMode::Interactive).await.unwrap();
    assert_eq!(marker(&harness.install_path), "new");

    updater.rollback().await.unwrap();
    assert_eq!(marker(&harness.install_path), "old");
    assert!(backups(&harness.install_path).is_empty());
}

#[tokio::test]
async fn test_progress_never_moves_backwards() {
    let mut harness = Harness::new();
    harness.publish("v2.1.0");
    let updater = harness.build();
    updater.check(CheckTrigger::Manual).await;

    let mut status = updater.subscribe();
    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while status.changed().await.is_ok() {
            let install = status.borrow_and_update().install.clone();
            seen.push((install.phase, install.progress));
            if install.phase == InstallPhase::Complete {
                break;
            }
        }
        seen
    });

    updater.install(InstallMode::Interactive).await.unwrap();
    let seen = watcher.await.unwrap();

    assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0 && w[0].1 <= w[1].1));
    assert_eq!(seen.last().map(|(phase, _)| *phase), Some(InstallPhase::Complete));
}
