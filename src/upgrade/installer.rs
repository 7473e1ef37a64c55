//! Install pipeline.
//!
//! ```text
//! preparing -> downloading -> verifying-checksum -> unpacking
//!           -> verifying-signature -> installing -> complete
//! ```
//!
//! Every step reports a non-decreasing progress fraction through the
//! [`StatusPublisher`]. Any error moves the status to `failed`, clears the
//! install sub-state and opens the release page so the user can install by
//! hand. The download and the unpacked archive live in one temporary
//! directory next to the install location; it is removed on every exit path.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{Result, UpdateError};
use crate::upgrade::archive::{ArchiveExtractor, locate_bundle};
use crate::upgrade::backup::{BackupManager, FileMover};
use crate::upgrade::platform::SystemShell;
use crate::upgrade::release::ReleaseInfo;
use crate::upgrade::signing::{CodeSigning, SignatureVerifier};
use crate::upgrade::status::{InstallPhase, StatusPublisher};
use crate::upgrade::transport::HttpTransport;
use crate::upgrade::verification::ChecksumVerifier;
use crate::utils::ensure_dir;

/// Who started the install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// The user; waits for restart-now or close-now at the end.
    Interactive,
    /// Auto-download; relaunches and exits on success.
    Automatic,
}

/// How an install ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// New bundle in place, waiting for the user's completion choice.
    AwaitingCompletion {
        /// Where the previous bundle was moved.
        backup: PathBuf,
    },
    /// New bundle relaunched and termination requested.
    Relaunched,
}

/// Local collaborators of the pipeline.
#[derive(Clone)]
pub struct InstallTools {
    /// Network.
    pub transport: Arc<dyn HttpTransport>,
    /// Archive extraction.
    pub extractor: Arc<dyn ArchiveExtractor>,
    /// Code-signing inspection.
    pub signing: Arc<dyn CodeSigning>,
    /// Filesystem moves for the swap.
    pub mover: Arc<dyn FileMover>,
    /// Relaunch, exit, open URL.
    pub shell: Arc<dyn SystemShell>,
}

/// Downloads, verifies and installs a release.
pub struct InstallPipeline {
    tools: InstallTools,
    publisher: Arc<StatusPublisher>,
    install_path: PathBuf,
    bundle_extension: String,
}

impl InstallPipeline {
    /// Pipeline replacing the bundle at `install_path`.
    pub fn new(
        tools: InstallTools,
        publisher: Arc<StatusPublisher>,
        install_path: PathBuf,
        bundle_extension: impl Into<String>,
    ) -> Self {
        Self {
            tools,
            publisher,
            install_path,
            bundle_extension: bundle_extension.into(),
        }
    }

    /// Installed bundle this pipeline replaces.
    pub fn install_path(&self) -> &Path {
        &self.install_path
    }

    /// Install `release`.
    pub async fn run(
        &self,
        release: &ReleaseInfo,
        mode: InstallMode,
        cancel: &CancellationToken,
    ) -> Result<InstallOutcome> {
        if !self.publisher.begin_install() {
            return Err(UpdateError::InstallUnsupported {
                reason: "an install is already in progress".to_string(),
            });
        }
        info!("Installing release {} ({:?})", release.version, mode);

        let result = match self.run_phases(release, cancel).await {
            Ok(backup) => self.finish(mode, backup),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            warn!("Install of {} failed: {}", release.version, e);
            self.publisher.failed(e.clone());
            if !matches!(e, UpdateError::Cancelled)
                && let Err(open_err) = self.tools.shell.open_url(&release.release_url)
            {
                warn!("Could not open release page: {}", open_err);
            }
        }
        result
    }

    /// Relaunch the installed bundle and exit.
    pub fn restart(&self) -> Result<()> {
        self.tools.shell.relaunch(&self.install_path)?;
        self.tools.shell.terminate(0);
        Ok(())
    }

    /// Exit without relaunching.
    pub fn close(&self) {
        self.tools.shell.terminate(0);
    }

    fn finish(&self, mode: InstallMode, backup: PathBuf) -> Result<InstallOutcome> {
        match mode {
            InstallMode::Interactive => {
                self.publisher.install_complete(true);
                Ok(InstallOutcome::AwaitingCompletion {
                    backup,
                })
            }
            InstallMode::Automatic => {
                self.publisher.install_complete(false);
                self.restart()?;
                Ok(InstallOutcome::Relaunched)
            }
        }
    }

    async fn run_phases(&self, release: &ReleaseInfo, cancel: &CancellationToken) -> Result<PathBuf> {
        self.enter(InstallPhase::Preparing, None, cancel)?;
        let (Some(url), Some(asset_name)) = (&release.download_url, &release.asset_name) else {
            return Err(UpdateError::NoDownloadAsset);
        };
        let work_dir = self.work_dir()?;
        debug!("Working in {}", work_dir.path().display());

        self.enter(InstallPhase::Downloading, Some(asset_name.clone()), cancel)?;
        let file_name = Path::new(asset_name).file_name().map_or_else(|| "asset".into(), |n| n.to_os_string());
        let archive = work_dir.path().join(file_name);
        let publisher = Arc::clone(&self.publisher);
        let span = InstallPhase::VerifyingChecksum.base_progress() - InstallPhase::Downloading.base_progress();
        let on_progress = move |done: u64, total: Option<u64>| {
            if let Some(total) = total.filter(|t| *t > 0) {
                let fraction = (done as f64 / total as f64).min(1.0);
                publisher.install_progress(
                    InstallPhase::Downloading,
                    InstallPhase::Downloading.base_progress() + span * fraction,
                    None,
                );
            }
        };
        tokio::select! {
            result = self.tools.transport.download(url, &archive, &on_progress) => {
                result?;
            }
            () = cancel.cancelled() => return Err(UpdateError::Cancelled),
        }

        self.enter(InstallPhase::VerifyingChecksum, None, cancel)?;
        ChecksumVerifier::verify_release_asset(&archive, &release.notes, asset_name).await?;

        self.enter(InstallPhase::Unpacking, None, cancel)?;
        let unpack_dir = work_dir.path().join("unpacked");
        ensure_dir(&unpack_dir).await?;
        self.tools.extractor.extract(&archive, &unpack_dir).await?;

        self.enter(InstallPhase::VerifyingSignature, None, cancel)?;
        let bundle = locate_bundle(&unpack_dir, &self.bundle_extension).ok_or_else(|| {
            UpdateError::InstallUnsupported {
                reason: format!("archive contains no .{} bundle", self.bundle_extension),
            }
        })?;
        SignatureVerifier::new(Arc::clone(&self.tools.signing))
            .verify(&bundle, &self.install_path)
            .await?;

        // Past this point the swap runs to completion or rolls back.
        self.enter(InstallPhase::Installing, None, cancel)?;
        let backup = BackupManager::new(self.install_path.clone(), Utc::now(), Arc::clone(&self.tools.mover));
        backup.swap_in(&bundle).await?;
        match backup.prune_older_backups().await {
            Ok(0) => {}
            Ok(n) => info!("Removed {} older backup(s) of {}", n, self.install_path.display()),
            Err(e) => warn!("Could not remove older backups: {}", e),
        }

        Ok(backup.backup_path().to_path_buf())
    }

    fn enter(&self, phase: InstallPhase, message: Option<String>, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(UpdateError::Cancelled);
        }
        self.publisher.install_progress(phase, phase.base_progress(), message);
        Ok(())
    }

    /// Temporary directory beside the install location so the final move is a
    /// same-filesystem rename.
    fn work_dir(&self) -> Result<tempfile::TempDir> {
        let builder = {
            let mut builder = tempfile::Builder::new();
            builder.prefix(".bundle-update-");
            builder
        };
        if let Some(parent) = self.install_path.parent().filter(|p| p.is_dir()) {
            match builder.tempdir_in(parent) {
                Ok(dir) => return Ok(dir),
                Err(e) => debug!("Cannot create work dir in {}: {}", parent.display(), e),
            }
        }
        builder.tempdir().map_err(|e| UpdateError::io("create temporary directory", &std::env::temp_dir(), &e))
    }
}
