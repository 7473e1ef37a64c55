//! Circuit breaker for automatic update checks.
//!
//! Failed checks are counted in the persisted state. Once the count reaches
//! the threshold a pause window opens and the counter starts over; while the
//! window is open automatic checks do not touch the network at all. Rate-limit
//! answers open the window directly with the server's reset time. Manual
//! checks ignore the window.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{info, warn};

use crate::constants::{FAILURE_COOLDOWN, FAILURE_THRESHOLD};
use crate::upgrade::state::UpdateState;

/// Who asked for a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckTrigger {
    /// The user asked; bypasses the pause window and deferrals.
    Manual,
    /// The background scheduler.
    Automatic,
}

/// Failure-counting pause policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(FAILURE_THRESHOLD, FAILURE_COOLDOWN)
    }
}

impl CircuitBreaker {
    /// Breaker opening after `threshold` failures for `cooldown`.
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
        }
    }

    /// `Err(until)` when a check with `trigger` must be skipped at `now`.
    pub fn check_allowed(
        &self,
        state: &UpdateState,
        now: DateTime<Utc>,
        trigger: CheckTrigger,
    ) -> Result<(), DateTime<Utc>> {
        if trigger == CheckTrigger::Manual {
            return Ok(());
        }
        match state.pause_until {
            Some(until) if now < until => Err(until),
            _ => Ok(()),
        }
    }

    /// A check succeeded: both breaker fields are cleared.
    pub fn record_success(&self, state: &mut UpdateState, now: DateTime<Utc>) {
        state.last_checked_at = Some(now);
        state.consecutive_failures = 0;
        state.pause_until = None;
    }

    /// A check failed. Returns the pause end when this failure opened the
    /// breaker.
    pub fn record_failure(
        &self,
        state: &mut UpdateState,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        state.last_checked_at = Some(now);
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        if state.consecutive_failures < self.threshold {
            return None;
        }

        let until = now + chrono_duration(self.cooldown);
        warn!(
            "{} consecutive update check failures, pausing automatic checks until {}",
            state.consecutive_failures, until
        );
        state.pause_until = Some(until);
        state.consecutive_failures = 0;
        Some(until)
    }

    /// Rate limit hit: pause until `until` without touching the counter.
    pub fn record_rate_limit(&self, state: &mut UpdateState, now: DateTime<Utc>, until: DateTime<Utc>) {
        info!("Release API rate limited, pausing automatic checks until {}", until);
        state.last_checked_at = Some(now);
        state.pause_until = Some(until);
    }
}

pub(crate) fn chrono_duration(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
