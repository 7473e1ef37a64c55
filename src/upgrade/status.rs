//! Observable update status.
//!
//! [`StatusPublisher`] owns the one [`StatusSnapshot`] UI consumers read. It
//! is a `tokio::sync::watch` channel: subscribers get the latest snapshot and
//! are woken on every change, from any thread or runtime.
//!
//! Status transitions:
//!
//! ```text
//! idle | upToDate | failed | updateAvailable --check--> checking
//! checking --newer--> updateAvailable
//! checking --not newer--> upToDate
//! checking --error--> failed
//! updateAvailable --skip/remind--> idle
//! updateAvailable --install fails--> failed
//! upToDate | failed --reset--> idle
//! ```
//!
//! The install sub-state ([`InstallState`]) rides alongside the status while
//! the status stays `updateAvailable`.

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::core::UpdateError;
use crate::upgrade::release::ReleaseInfo;

/// Top-level update status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateStatus {
    /// Nothing happening.
    #[default]
    Idle,
    /// A check is in flight.
    Checking,
    /// A newer release was found.
    UpdateAvailable,
    /// The installed version is the latest.
    UpToDate,
    /// The last check or install failed.
    Failed,
}

impl UpdateStatus {
    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: Self) -> bool {
        use UpdateStatus::*;
        matches!(
            (self, next),
            (Idle | UpToDate | Failed | UpdateAvailable, Checking)
                | (Checking, UpdateAvailable | UpToDate | Failed)
                | (UpdateAvailable, Idle | Failed)
                | (UpToDate | Failed, Idle)
        )
    }
}

impl std::fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::UpdateAvailable => "update available",
            Self::UpToDate => "up to date",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Step of the install pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallPhase {
    /// Not installing.
    #[default]
    Idle,
    /// Resolving the asset.
    Preparing,
    /// Fetching the asset.
    Downloading,
    /// Checking the content hash.
    VerifyingChecksum,
    /// Extracting the archive.
    Unpacking,
    /// Checking the code signature.
    VerifyingSignature,
    /// Swapping bundles.
    Installing,
    /// Done, waiting for restart or close.
    Complete,
}

impl InstallPhase {
    /// Progress reported when the phase starts.
    pub fn base_progress(self) -> f64 {
        match self {
            Self::Idle => 0.0,
            Self::Preparing => 0.02,
            Self::Downloading => 0.05,
            Self::VerifyingChecksum => 0.65,
            Self::Unpacking => 0.72,
            Self::VerifyingSignature => 0.82,
            Self::Installing => 0.9,
            Self::Complete => 1.0,
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::Downloading => "downloading",
            Self::VerifyingChecksum => "verifying checksum",
            Self::Unpacking => "unpacking",
            Self::VerifyingSignature => "verifying signature",
            Self::Installing => "installing",
            Self::Complete => "complete",
        }
    }
}

/// Install sub-state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallState {
    /// An install is running.
    pub is_installing: bool,
    /// Fraction in `0.0..=1.0`, never decreasing within one install.
    pub progress: f64,
    /// Current step.
    pub phase: InstallPhase,
    /// Optional detail for the UI.
    pub message: Option<String>,
    /// Install finished; waiting for restart-now or close-now.
    pub awaiting_completion_action: bool,
}

/// Everything a UI needs to render the updater.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Top-level status.
    pub status: UpdateStatus,
    /// Release behind `updateAvailable`.
    pub release: Option<ReleaseInfo>,
    /// Last failure, kept until the next check.
    #[serde(serialize_with = "serialize_error")]
    pub last_error: Option<UpdateError>,
    /// Install sub-state.
    pub install: InstallState,
}

fn serialize_error<S: serde::Serializer>(
    error: &Option<UpdateError>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Publishes [`StatusSnapshot`]s.
#[derive(Debug)]
pub struct StatusPublisher {
    tx: watch::Sender<StatusSnapshot>,
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusPublisher {
    /// Publisher starting at `idle`.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StatusSnapshot::default());
        Self {
            tx,
        }
    }

    /// Receive every future snapshot.
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    /// Enter `checking`. Returns `false`, changing nothing, when a check or an
    /// install is already running.
    pub fn begin_check(&self) -> bool {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.install.is_installing || !snapshot.status.can_transition_to(UpdateStatus::Checking) {
                return false;
            }
            debug!("Update status: {} -> checking", snapshot.status);
            snapshot.status = UpdateStatus::Checking;
            snapshot.last_error = None;
            true
        })
    }

    /// Leave `checking` with a newer release.
    pub fn update_available(&self, release: ReleaseInfo) {
        self.transition(UpdateStatus::UpdateAvailable, |snapshot| {
            snapshot.release = Some(release);
        });
    }

    /// Leave `checking` without a newer release.
    pub fn up_to_date(&self) {
        self.transition(UpdateStatus::UpToDate, |snapshot| {
            snapshot.release = None;
        });
    }

    /// Leave `checking` (or an install) with an error. The error and the
    /// cleared install state are published even when the status itself
    /// cannot move.
    pub fn failed(&self, error: UpdateError) {
        self.tx.send_modify(|snapshot| {
            if snapshot.status.can_transition_to(UpdateStatus::Failed) {
                debug!("Update status: {} -> failed", snapshot.status);
                snapshot.status = UpdateStatus::Failed;
            }
            snapshot.last_error = Some(error);
            snapshot.install = InstallState::default();
        });
    }

    /// Back to `idle`; used by skip/remind and to reset a finished state.
    pub fn reset(&self) {
        self.transition(UpdateStatus::Idle, |snapshot| {
            snapshot.release = None;
            snapshot.install = InstallState::default();
        });
    }

    /// Automatic check was skipped; leave `checking` without surfacing anything.
    pub fn abandon_check(&self, release: Option<ReleaseInfo>) {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.status != UpdateStatus::Checking {
                return false;
            }
            snapshot.status = UpdateStatus::Idle;
            snapshot.release = release;
            true
        });
    }

    /// Start the install sub-state.
    pub fn begin_install(&self) -> bool {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.install.is_installing || snapshot.install.awaiting_completion_action {
                return false;
            }
            snapshot.install = InstallState {
                is_installing: true,
                ..Default::default()
            };
            true
        })
    }

    /// Report install progress. Progress never moves backwards.
    pub fn install_progress(&self, phase: InstallPhase, progress: f64, message: Option<String>) {
        self.tx.send_if_modified(|snapshot| {
            if !snapshot.install.is_installing {
                return false;
            }
            let progress = progress.clamp(0.0, 1.0).max(snapshot.install.progress);
            if snapshot.install.phase != phase {
                debug!("Install phase: {}", phase.label());
            }
            snapshot.install.phase = phase.max(snapshot.install.phase);
            snapshot.install.progress = progress;
            snapshot.install.message = message;
            true
        });
    }

    /// Install finished. `awaiting` sets the completion overlay.
    pub fn install_complete(&self, awaiting: bool) {
        self.tx.send_modify(|snapshot| {
            snapshot.install = InstallState {
                is_installing: false,
                progress: 1.0,
                phase: InstallPhase::Complete,
                message: None,
                awaiting_completion_action: awaiting,
            };
        });
    }

    fn transition(&self, next: UpdateStatus, apply: impl FnOnce(&mut StatusSnapshot)) {
        self.tx.send_if_modified(|snapshot| {
            if !snapshot.status.can_transition_to(next) {
                warn!("Ignoring update status change {} -> {}", snapshot.status, next);
                return false;
            }
            debug!("Update status: {} -> {}", snapshot.status, next);
            snapshot.status = next;
            apply(snapshot);
            true
        });
    }
}
