//! The update orchestrator.
//!
//! [`Updater`] ties the pieces together: it gates checks through the circuit
//! breaker and the non-reentrant `checking` status, runs the fetcher, applies
//! the prompt policy, drives the install pipeline and owns the background
//! scheduler. UI code only needs an `Arc<Updater>` and a status subscription.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::UpdaterConfig;
use crate::core::{Result, UpdateError};
use crate::upgrade::archive::SystemExtractor;
use crate::upgrade::backup::{TokioMover, rollback_from_backup};
use crate::upgrade::breaker::{CheckTrigger, CircuitBreaker, chrono_duration};
use crate::upgrade::fetcher::{ReleaseFetcher, ReleaseSource};
use crate::upgrade::installer::{InstallMode, InstallOutcome, InstallPipeline, InstallTools};
use crate::upgrade::platform::DesktopShell;
use crate::upgrade::release::ReleaseInfo;
use crate::upgrade::scheduler::{ScheduledCheck, Scheduler};
use crate::upgrade::signing::CodesignTool;
use crate::upgrade::state::{Preferences, StateStore, UpdateState};
use crate::upgrade::status::{StatusPublisher, StatusSnapshot, UpdateStatus};
use crate::upgrade::transport::ReqwestTransport;
use crate::version::VersionComparator;

/// Result of [`Updater::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// A newer release is available.
    UpdateAvailable(ReleaseInfo),
    /// The installed version is current.
    UpToDate,
    /// A newer release exists but the user skipped it or asked to be reminded
    /// later; automatic checks stay quiet.
    Suppressed(ReleaseInfo),
    /// Automatic checks are paused; the network was not contacted.
    Paused {
        /// End of the pause window.
        until: DateTime<Utc>,
    },
    /// Another check is in flight.
    AlreadyChecking,
    /// The check failed.
    Failed(UpdateError),
}

/// User's choice once an interactive install finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionAction {
    /// Relaunch the new bundle, then exit.
    RestartNow,
    /// Exit; the new version starts next time.
    CloseNow,
}

/// Self-update orchestrator.
pub struct Updater {
    me: Weak<Updater>,
    current_version: String,
    releases_page: String,
    store: Arc<StateStore>,
    breaker: CircuitBreaker,
    fetcher: ReleaseFetcher,
    publisher: Arc<StatusPublisher>,
    pipeline: InstallPipeline,
    tools: InstallTools,
    scheduler: Scheduler,
    cancel: CancellationToken,
}

impl Updater {
    /// Updater using the given collaborators.
    pub fn new(config: &UpdaterConfig, install_path: PathBuf, store: Arc<StateStore>, tools: InstallTools) -> Arc<Self> {
        let publisher = Arc::new(StatusPublisher::new());
        let fetcher = ReleaseFetcher::new(
            ReleaseSource::from_config(config),
            Arc::clone(&tools.transport),
            Arc::clone(&store),
        );
        let pipeline = InstallPipeline::new(
            tools.clone(),
            Arc::clone(&publisher),
            install_path,
            config.bundle_extension.clone(),
        );

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            current_version: VersionComparator::normalize(&config.current_version()),
            releases_page: config.releases_page_url(),
            store,
            breaker: CircuitBreaker::default(),
            fetcher,
            publisher,
            pipeline,
            tools,
            scheduler: Scheduler::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Updater wired to the network, the system tools and the state file.
    pub fn from_config(config: &UpdaterConfig) -> Result<Arc<Self>> {
        config.validate().map_err(config_error)?;
        let install_path = config.install_path().map_err(config_error)?;
        let state_path = config.state_path().map_err(config_error)?;

        let transport = ReqwestTransport::new(
            &config.user_agent(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        let tools = InstallTools {
            transport: Arc::new(transport),
            extractor: Arc::new(SystemExtractor),
            signing: Arc::new(CodesignTool::new()),
            mover: Arc::new(TokioMover),
            shell: Arc::new(DesktopShell),
        };

        debug!("Update state at {}", state_path.display());
        Ok(Self::new(config, install_path, Arc::new(StateStore::new(state_path)), tools))
    }

    /// Installed version.
    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// Installed bundle location.
    pub fn install_path(&self) -> &std::path::Path {
        self.pipeline.install_path()
    }

    /// Latest published status.
    pub fn status(&self) -> StatusSnapshot {
        self.publisher.snapshot()
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.publisher.subscribe()
    }

    /// Copy of the persisted state.
    pub async fn state(&self) -> Result<UpdateState> {
        self.store.snapshot().await
    }

    /// Check for a newer release.
    ///
    /// Automatic checks respect the pause window and the user's deferrals;
    /// manual checks ignore both. Neither kind runs while another check is in
    /// flight. Every failure is published and counted by the circuit breaker.
    pub async fn check(&self, trigger: CheckTrigger) -> CheckOutcome {
        let now = Utc::now();
        let state = match self.store.snapshot().await {
            Ok(state) => state,
            Err(e) => return CheckOutcome::Failed(e),
        };

        if let Err(until) = self.breaker.check_allowed(&state, now, trigger) {
            debug!("Automatic update check skipped, paused until {}", until);
            return CheckOutcome::Paused {
                until,
            };
        }

        if !self.publisher.begin_check() {
            debug!("Update check already in progress");
            return CheckOutcome::AlreadyChecking;
        }
        info!("Checking for updates ({:?})", trigger);

        match self.fetcher.fetch().await {
            Ok(release) => self.on_release(release, trigger, now).await,
            Err(e) => {
                warn!("Update check failed: {}", e);
                self.record_failure(&e, now).await;
                self.publisher.failed(e.clone());
                CheckOutcome::Failed(e)
            }
        }
    }

    async fn on_release(&self, release: ReleaseInfo, trigger: CheckTrigger, now: DateTime<Utc>) -> CheckOutcome {
        if !VersionComparator::is_newer(&release.version, &self.current_version) {
            info!("{} is up to date (latest {})", self.current_version, release.version);
            self.publisher.up_to_date();
            return CheckOutcome::UpToDate;
        }

        info!("Update available: {} -> {}", self.current_version, release.version);
        if trigger == CheckTrigger::Manual {
            self.publisher.update_available(release.clone());
            return CheckOutcome::UpdateAvailable(release);
        }

        let state = match self.store.snapshot().await {
            Ok(state) => state,
            Err(e) => {
                self.publisher.failed(e.clone());
                return CheckOutcome::Failed(e);
            }
        };

        // Skip and remind-later also hold back automatic installs.
        if !state.should_prompt(&release.version, now) {
            debug!("Not prompting for {}: skipped or deferred", release.version);
            self.publisher.abandon_check(None);
            return CheckOutcome::Suppressed(release);
        }

        if state.auto_download_enabled {
            self.publisher.update_available(release.clone());
            match self.pipeline.run(&release, InstallMode::Automatic, &self.cancel).await {
                Ok(_) => info!("Automatic install of {} finished", release.version),
                Err(e) => warn!("Automatic install of {} failed: {}", release.version, e),
            }
            return CheckOutcome::UpdateAvailable(release);
        }

        self.publisher.update_available(release.clone());
        CheckOutcome::UpdateAvailable(release)
    }

    async fn record_failure(&self, error: &UpdateError, now: DateTime<Utc>) {
        let breaker = self.breaker;
        let result = match error {
            UpdateError::RateLimited {
                until,
            } => {
                let until = *until;
                self.store.update(move |s| breaker.record_rate_limit(s, now, until)).await.map(|_| ())
            }
            _ => self.store.update(move |s| breaker.record_failure(s, now)).await.map(|_| ()),
        };
        if let Err(e) = result {
            warn!("Could not record failed check: {}", e);
        }
    }

    /// Release an install would use: the one on display, else the cached one
    /// when it is newer than the installed version.
    async fn pending_release(&self) -> Result<Option<ReleaseInfo>> {
        if let Some(release) = self.publisher.snapshot().release {
            return Ok(Some(release));
        }
        let cached = self.store.snapshot().await?.cached_release;
        Ok(cached.filter(|r| VersionComparator::is_newer(&r.version, &self.current_version)))
    }

    /// Install the pending release.
    pub async fn install(&self, mode: InstallMode) -> Result<InstallOutcome> {
        let Some(release) = self.pending_release().await? else {
            let error = UpdateError::NoDownloadAsset;
            self.publisher.failed(error.clone());
            return Err(error);
        };
        self.pipeline.run(&release, mode, &self.cancel).await
    }

    /// Finish an interactive install.
    pub fn complete(&self, action: CompletionAction) -> Result<()> {
        if !self.publisher.snapshot().install.awaiting_completion_action {
            return Err(UpdateError::InstallUnsupported {
                reason: "no install is waiting for a restart".to_string(),
            });
        }
        match action {
            CompletionAction::RestartNow => self.pipeline.restart(),
            CompletionAction::CloseNow => {
                self.pipeline.close();
                Ok(())
            }
        }
    }

    /// Skip the pending release. Returns the skipped version.
    pub async fn skip_version(&self) -> Result<Option<String>> {
        let Some(release) = self.pending_release().await? else {
            return Ok(None);
        };
        let version = release.version.clone();
        self.store.update(|s| s.skip_version(&version)).await?;
        self.dismiss();
        info!("Skipping version {}", version);
        Ok(Some(version))
    }

    /// Defer automatic prompts for `duration`.
    pub async fn remind_later(&self, duration: Duration) -> Result<DateTime<Utc>> {
        let until = Utc::now() + chrono_duration(duration);
        self.store.update(|s| s.remind_later(until)).await?;
        self.dismiss();
        info!("Reminding about updates after {}", until);
        Ok(until)
    }

    /// Forget skipped versions and reminders.
    pub async fn clear_deferrals(&self) -> Result<()> {
        self.store.update(UpdateState::clear_user_deferrals).await
    }

    fn dismiss(&self) {
        if self.publisher.snapshot().status == UpdateStatus::UpdateAvailable {
            self.publisher.reset();
        }
    }

    /// Store preferences and restart the background loop to match.
    pub async fn set_preferences(&self, prefs: Preferences) -> Result<()> {
        self.store.update(|s| s.set_preferences(prefs)).await?;
        info!(
            "Preferences: auto-check {}, interval {}, auto-download {}",
            prefs.auto_check_enabled, prefs.check_interval, prefs.auto_download_enabled
        );
        self.start_scheduler().await
    }

    /// Start (or restart) automatic checks according to the stored
    /// preferences. The first check is due one interval after the last one.
    pub async fn start_scheduler(&self) -> Result<()> {
        let state = self.store.snapshot().await?;
        if !state.auto_check_enabled {
            self.scheduler.stop();
            return Ok(());
        }

        let interval = state.check_interval.as_duration();
        let first_delay = state
            .last_checked_at
            .map(|last| last + chrono_duration(interval) - Utc::now())
            .and_then(|remaining| remaining.to_std().ok())
            .unwrap_or(Duration::ZERO);

        let target: Weak<dyn ScheduledCheck> = self.me.clone();
        self.scheduler.restart(first_delay, interval, target);
        Ok(())
    }

    /// Stop automatic checks.
    pub fn stop_scheduler(&self) {
        self.scheduler.stop();
    }

    /// Whether the background loop is live.
    pub fn scheduler_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Restore the most recent backup of the installed bundle.
    pub async fn rollback(&self) -> Result<PathBuf> {
        rollback_from_backup(self.pipeline.install_path(), Arc::clone(&self.tools.mover)).await
    }

    /// Open the release page of the pending release, or the releases list.
    pub async fn open_release_page(&self) -> Result<()> {
        let url = match self.pending_release().await? {
            Some(release) => release.release_url,
            None => self.releases_page.clone(),
        };
        self.tools.shell.open_url(&url)
    }

    /// Stop the scheduler and cancel a running install.
    pub fn shutdown(&self) {
        self.scheduler.stop();
        self.cancel.cancel();
    }
}

#[async_trait]
impl ScheduledCheck for Updater {
    async fn run_scheduled_check(&self) {
        match self.check(CheckTrigger::Automatic).await {
            CheckOutcome::Failed(e) => debug!("Scheduled check failed: {}", e),
            outcome => debug!("Scheduled check: {:?}", outcome),
        }
    }
}

fn config_error(error: anyhow::Error) -> UpdateError {
    UpdateError::Config {
        message: format!("{error:#}"),
    }
}
