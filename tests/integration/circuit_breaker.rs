//! Failure counting and pause windows across checks and restarts.

use bundle_updater::core::UpdateError;
use bundle_updater::upgrade::state::{StateStore, UpdateState};
use bundle_updater::upgrade::{CheckOutcome, CheckTrigger};
use chrono::{Duration, Utc};

use super::common::Harness;

fn transport_error() -> UpdateError {
    UpdateError::Transport("connection reset by peer".to_string())
}

#[tokio::test]
async fn test_three_failures_pause_automatic_checks() {
    let mut harness = Harness::new();
    for _ in 0..3 {
        harness.transport.push_error(transport_error());
    }
    let updater = harness.build();

    for expected in [1, 2] {
        assert!(matches!(updater.check(CheckTrigger::Automatic).await, CheckOutcome::Failed(_)));
        let state = updater.state().await.unwrap();
        assert_eq!(state.consecutive_failures, expected);
        assert!(state.pause_until.is_none());
    }

    assert!(matches!(updater.check(CheckTrigger::Automatic).await, CheckOutcome::Failed(_)));
    let state = updater.state().await.unwrap();
    let until = state.pause_until.expect("breaker should be open");
    assert!(until > Utc::now() + Duration::minutes(59));
    assert_eq!(state.consecutive_failures, 0);

    let outcome = updater.check(CheckTrigger::Automatic).await;
    assert_eq!(
        outcome,
        CheckOutcome::Paused {
            until
        }
    );
    assert_eq!(harness.transport.get_calls(), 3);
    assert_eq!(updater.state().await.unwrap(), state);
}

#[tokio::test]
async fn test_manual_check_bypasses_pause_and_closes_breaker() {
    let paused = UpdateState {
        pause_until: Some(Utc::now() + Duration::hours(1)),
        consecutive_failures: 0,
        ..Default::default()
    };
    let mut harness = Harness::new().with_store(StateStore::with_state(paused));
    harness.publish("v2.1.0");
    let updater = harness.build();

    assert!(matches!(updater.check(CheckTrigger::Automatic).await, CheckOutcome::Paused { .. }));
    assert_eq!(harness.transport.get_calls(), 0);

    assert!(matches!(updater.check(CheckTrigger::Manual).await, CheckOutcome::UpdateAvailable(_)));
    let state = updater.state().await.unwrap();
    assert!(state.pause_until.is_none());
    assert_eq!(state.consecutive_failures, 0);
}

#[tokio::test]
async fn test_expired_pause_allows_checks() {
    let expired = UpdateState {
        pause_until: Some(Utc::now() - Duration::minutes(1)),
        ..Default::default()
    };
    let mut harness = Harness::new().with_store(StateStore::with_state(expired));
    harness.publish("v2.1.0");
    let updater = harness.build();

    assert!(matches!(updater.check(CheckTrigger::Automatic).await, CheckOutcome::UpdateAvailable(_)));
    assert_eq!(harness.transport.get_calls(), 1);
}

#[tokio::test]
async fn test_success_resets_failure_count() {
    let mut harness = Harness::new();
    harness.transport.push_error(transport_error());
    harness.transport.push_error(transport_error());
    harness.publish("v2.0.0");
    harness.transport.push_error(transport_error());
    let updater = harness.build();

    updater.check(CheckTrigger::Automatic).await;
    updater.check(CheckTrigger::Automatic).await;
    assert_eq!(updater.check(CheckTrigger::Automatic).await, CheckOutcome::UpToDate);
    assert_eq!(updater.state().await.unwrap().consecutive_failures, 0);

    updater.check(CheckTrigger::Automatic).await;
    let state = updater.state().await.unwrap();
    assert_eq!(state.consecutive_failures, 1);
    assert!(state.pause_until.is_none());
}

#[tokio::test]
async fn test_rate_limit_reset_header_sets_pause() {
    let reset = Utc::now() + Duration::minutes(10);
    let mut harness = Harness::new();
    harness.transport.push_rate_limited(Some(reset.timestamp()));
    let updater = harness.build();

    let outcome = updater.check(CheckTrigger::Automatic).await;
    assert!(matches!(outcome, CheckOutcome::Failed(UpdateError::RateLimited { .. })));

    let state = updater.state().await.unwrap();
    assert_eq!(state.pause_until.map(|t| t.timestamp()), Some(reset.timestamp()));
    assert_eq!(state.consecutive_failures, 0);
}

#[tokio::test]
async fn test_pause_survives_restart() {
    let mut first = Harness::new();
    let state_path = first.state_path();
    first = first.with_store(StateStore::new(state_path.clone()));
    for _ in 0..3 {
        first.transport.push_error(transport_error());
    }
    let updater = first.build();
    for _ in 0..3 {
        updater.check(CheckTrigger::Automatic).await;
    }
    assert!(state_path.exists());
    drop(updater);

    let mut second = Harness::new().with_store(StateStore::new(state_path));
    second.publish("v2.1.0");
    let restarted = second.build();

    assert!(matches!(restarted.check(CheckTrigger::Automatic).await, CheckOutcome::Paused { .. }));
    assert_eq!(second.transport.get_calls(), 0);
}
