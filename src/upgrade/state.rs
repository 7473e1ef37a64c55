//! Persisted update state.
//!
//! A small JSON document that survives restarts: when we last checked, the
//! last validated release with its ETag, the circuit-breaker counters, the
//! user's deferrals (skipped version, remind-later) and the preferences the UI
//! toggles.
//!
//! The breaker fields are reset by every successful check. The deferral fields
//! are only ever cleared by an explicit user action; nothing in the updater
//! clears them on its own.
//!
//! [`StateStore`] loads the file lazily on first access and writes it back
//! atomically after every mutation. Concurrent writers are serialized by a
//! mutex and the last write wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::core::{Result, UpdateError};
use crate::upgrade::breaker::CircuitBreaker;
use crate::upgrade::release::ReleaseInfo;
use crate::utils::atomic_write;
use crate::version::VersionComparator;

/// How often the background loop checks for updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInterval {
    /// Every hour.
    Hourly,
    /// Every day (default).
    #[default]
    Daily,
    /// Every week.
    Weekly,
}

impl CheckInterval {
    /// Sleep between two automatic checks.
    pub fn as_duration(self) -> Duration {
        match self {
            Self::Hourly => Duration::from_secs(60 * 60),
            Self::Daily => Duration::from_secs(24 * 60 * 60),
            Self::Weekly => Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

impl std::fmt::Display for CheckInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hourly => write!(f, "hourly"),
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
        }
    }
}

impl std::str::FromStr for CheckInterval {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            other => Err(format!("unknown interval '{other}' (expected hourly, daily or weekly)")),
        }
    }
}

/// Preferences written by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preferences {
    /// Run the background check loop.
    pub auto_check_enabled: bool,
    /// Interval of the background loop.
    pub check_interval: CheckInterval,
    /// Install newer releases without prompting.
    pub auto_download_enabled: bool,
}

/// Everything the updater persists between launches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateState {
    /// Time of the last check attempt.
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Last validated release, served again on `304 Not Modified`.
    pub cached_release: Option<ReleaseInfo>,
    /// ETag belonging to `cached_release`.
    pub etag: Option<String>,
    /// Failed checks since the last success.
    pub consecutive_failures: u32,
    /// Automatic checks are suppressed until this time.
    pub pause_until: Option<DateTime<Utc>>,
    /// Version the user chose to skip.
    pub skipped_version: Option<String>,
    /// Automatic prompts are deferred until this time.
    pub remind_until: Option<DateTime<Utc>>,
    /// Run the background check loop.
    pub auto_check_enabled: bool,
    /// Interval of the background loop.
    pub check_interval: CheckInterval,
    /// Install newer releases without prompting.
    pub auto_download_enabled: bool,
}

impl Default for UpdateState {
    fn default() -> Self {
        Self {
            last_checked_at: None,
            cached_release: None,
            etag: None,
            consecutive_failures: 0,
            pause_until: None,
            skipped_version: None,
            remind_until: None,
            auto_check_enabled: true,
            check_interval: CheckInterval::default(),
            auto_download_enabled: false,
        }
    }
}

impl UpdateState {
    /// Current preference values.
    pub fn preferences(&self) -> Preferences {
        Preferences {
            auto_check_enabled: self.auto_check_enabled,
            check_interval: self.check_interval,
            auto_download_enabled: self.auto_download_enabled,
        }
    }

    /// Overwrite the preference values.
    pub fn set_preferences(&mut self, prefs: Preferences) {
        self.auto_check_enabled = prefs.auto_check_enabled;
        self.check_interval = prefs.check_interval;
        self.auto_download_enabled = prefs.auto_download_enabled;
    }

    /// Remember a freshly validated release and its ETag.
    pub fn cache_release(&mut self, release: ReleaseInfo, etag: Option<String>) {
        self.cached_release = Some(release);
        if etag.is_some() {
            self.etag = etag;
        }
    }

    /// A check succeeded with `release`: breaker fields are cleared and the
    /// release is cached.
    pub fn record_success(&mut self, etag: Option<String>, release: ReleaseInfo, now: DateTime<Utc>) {
        CircuitBreaker::default().record_success(self, now);
        self.cache_release(release, etag);
    }

    /// A check failed; opens the default breaker on the third failure.
    pub fn record_failure(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        CircuitBreaker::default().record_failure(self, now)
    }

    /// Whether automatic checks are paused at `now`.
    pub fn is_paused(&self, now: DateTime<Utc>) -> bool {
        self.pause_until.is_some_and(|until| now < until)
    }

    /// User chose to skip `version`.
    pub fn skip_version(&mut self, version: &str) {
        self.skipped_version = Some(version.to_string());
    }

    /// User chose to be reminded later.
    pub fn remind_later(&mut self, until: DateTime<Utc>) {
        self.remind_until = Some(until);
    }

    /// User reset their deferrals.
    pub fn clear_user_deferrals(&mut self) {
        self.skipped_version = None;
        self.remind_until = None;
    }

    /// Whether an automatic check may surface `version` to the user.
    ///
    /// A skipped version stays silent only while it is the latest one; a newer
    /// release prompts again.
    pub fn should_prompt(&self, version: &str, now: DateTime<Utc>) -> bool {
        if let Some(skipped) = &self.skipped_version
            && !VersionComparator::is_newer(version, skipped)
        {
            return false;
        }
        match self.remind_until {
            Some(until) => now >= until,
            None => true,
        }
    }
}

/// Lazily loaded, atomically persisted [`UpdateState`].
#[derive(Debug)]
pub struct StateStore {
    path: Option<PathBuf>,
    state: Mutex<Option<UpdateState>>,
}

impl StateStore {
    /// Store backed by the JSON file at `path`.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            state: Mutex::new(None),
        }
    }

    /// Store that never touches disk.
    pub fn in_memory() -> Self {
        Self::with_state(UpdateState::default())
    }

    /// In-memory store seeded with `state`.
    pub fn with_state(state: UpdateState) -> Self {
        Self {
            path: None,
            state: Mutex::new(Some(state)),
        }
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> Result<UpdateState> {
        let mut guard = self.state.lock().await;
        Ok(self.loaded(&mut guard).await.clone())
    }

    /// Mutate the state and persist it. Returns whatever `f` returns.
    pub async fn update<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut UpdateState) -> R,
    {
        let mut guard = self.state.lock().await;
        let state = self.loaded(&mut guard).await;
        let result = f(state);
        let snapshot = state.clone();
        self.persist(&snapshot).await?;
        Ok(result)
    }

    async fn loaded<'a>(&self, slot: &'a mut Option<UpdateState>) -> &'a mut UpdateState {
        if slot.is_none() {
            *slot = Some(self.load_from_disk().await);
        }
        slot.get_or_insert_with(UpdateState::default)
    }

    async fn load_from_disk(&self) -> UpdateState {
        let Some(path) = &self.path else {
            return UpdateState::default();
        };

        match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(state) => {
                    debug!("Loaded update state from {}", path.display());
                    state
                }
                Err(e) => {
                    warn!("Ignoring unreadable update state at {}: {}", path.display(), e);
                    UpdateState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No update state at {}, starting fresh", path.display());
                UpdateState::default()
            }
            Err(e) => {
                warn!("Failed to read update state at {}: {}", path.display(), e);
                UpdateState::default()
            }
        }
    }

    async fn persist(&self, state: &UpdateState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(state).map_err(|e| UpdateError::StateStore {
            message: format!("cannot serialize update state: {e}"),
        })?;
        atomic_write(path, &json).await.map_err(|e| UpdateError::StateStore {
            message: e.to_string(),
        })
    }
}
