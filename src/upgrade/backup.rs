use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::constants::{MAX_RESTORE_ATTEMPTS, RESTORE_RETRY_DELAY};
use crate::core::{Result, UpdateError};
use crate::utils::remove_path;

/// Marker between the bundle name and the backup timestamp.
const BACKUP_MARKER: &str = ".backup-";

/// Timestamp format of backup names (`YYYYMMDDHHMMSS`).
const BACKUP_TIMESTAMP: &str = "%Y%m%d%H%M%S";

/// Filesystem moves used by the swap.
#[async_trait]
pub trait FileMover: Send + Sync {
    /// Move `from` to `to` (same filesystem).
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}

/// [`FileMover`] using `tokio::fs::rename`.
#[derive(Debug, Clone, Default)]
pub struct TokioMover;

#[async_trait]
impl FileMover for TokioMover {
    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        debug!("Moving {} -> {}", from.display(), to.display());
        tokio::fs::rename(from, to).await.map_err(|e| UpdateError::io("move", from, &e))
    }
}

/// Manages the backup taken while swapping an installed bundle.
///
/// The installed bundle is moved aside to a timestamped sibling
/// (`<name>.backup-<YYYYMMDDHHMMSS>`) rather than copied, so the swap is two
/// renames on the same filesystem. If putting the new bundle in place fails,
/// the backup is moved back before the error is reported: the application must
/// never be left missing from disk.
///
/// # Backup Strategy
///
/// 1. **Move aside**: installed bundle becomes the backup
/// 2. **Move in**: new bundle takes the vacated path
/// 3. **Rollback**: on failure of step 2, the backup is restored with retries
/// 4. **Keep**: on success the new backup stays for a later rollback; older
///    backups are removed by [`prune_older_backups`](Self::prune_older_backups)
///
/// # Platform Considerations
///
/// Restores are retried because a file inside the bundle may still be held
/// open for a moment (Windows in particular).
pub struct BackupManager {
    original_path: PathBuf,
    backup_path: PathBuf,
    mover: Arc<dyn FileMover>,
    retry_delay: Duration,
}

impl BackupManager {
    /// Backup manager for `install_path` with a backup named after `now`.
    pub fn new(install_path: PathBuf, now: DateTime<Utc>, mover: Arc<dyn FileMover>) -> Self {
        let backup_path = backup_path_for(&install_path, now);
        Self::with_backup(install_path, backup_path, mover)
    }

    /// Backup manager for an existing backup.
    pub fn with_backup(install_path: PathBuf, backup_path: PathBuf, mover: Arc<dyn FileMover>) -> Self {
        Self {
            original_path: install_path,
            backup_path,
            mover,
            retry_delay: RESTORE_RETRY_DELAY,
        }
    }

    /// Override the delay between restore attempts.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Replace the installed bundle with `new_bundle`.
    ///
    /// # Errors
    ///
    /// [`UpdateError::InstallUnsupported`] when either move fails. The
    /// installed bundle has been restored in that case unless the restore
    /// itself failed, which is logged.
    pub async fn swap_in(&self, new_bundle: &Path) -> Result<()> {
        if !self.original_path.exists() {
            return Err(UpdateError::InstallUnsupported {
                reason: format!("installed bundle not found at {}", self.original_path.display()),
            });
        }

        info!("Moving installed bundle aside to {}", self.backup_path.display());
        if let Err(e) = self.mover.rename(&self.original_path, &self.backup_path).await {
            warn!("Could not move installed bundle aside: {}", e);
            return Err(swap_failed(&e));
        }

        info!("Moving new bundle into {}", self.original_path.display());
        if let Err(e) = self.mover.rename(new_bundle, &self.original_path).await {
            warn!("Could not move new bundle into place: {}", e);
            if let Err(restore) = self.restore_backup().await {
                warn!("Rollback failed, backup left at {}: {}", self.backup_path.display(), restore);
            }
            return Err(swap_failed(&e));
        }

        info!("Installed new bundle at {}", self.original_path.display());
        Ok(())
    }

    /// Move the backup back to the install path, retrying on failure.
    pub async fn restore_backup(&self) -> Result<()> {
        if !self.backup_path.exists() {
            return Err(UpdateError::Io {
                operation: "restore".to_string(),
                path: self.backup_path.display().to_string(),
                message: "no backup found".to_string(),
            });
        }

        warn!("Restoring from backup at {}", self.backup_path.display());

        let mut attempts = 0;
        loop {
            match self.attempt_restore().await {
                Ok(()) => {
                    info!("Successfully restored from backup");
                    return Ok(());
                }
                Err(e) if attempts + 1 < MAX_RESTORE_ATTEMPTS => {
                    attempts += 1;
                    warn!("Restore attempt {} failed: {}. Retrying...", attempts, e);
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt_restore(&self) -> Result<()> {
        // A half-moved new bundle may occupy the path.
        remove_path(&self.original_path).await?;
        self.mover.rename(&self.backup_path, &self.original_path).await
    }

    /// Delete every backup of the install path except this one. Returns how
    /// many were removed.
    pub async fn prune_older_backups(&self) -> Result<usize> {
        let mut removed = 0;
        for (_, path) in list_backups(&self.original_path).await? {
            if path == self.backup_path {
                continue;
            }
            debug!("Removing old backup {}", path.display());
            remove_path(&path).await?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Whether the backup is on disk.
    pub fn backup_exists(&self) -> bool {
        self.backup_path.exists()
    }

    /// Backup location.
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }
}

fn swap_failed(cause: &UpdateError) -> UpdateError {
    UpdateError::InstallUnsupported {
        reason: format!(
            "could not replace the installed application ({cause}); likely a permissions problem, use manual download instead"
        ),
    }
}

/// `<install_path>.backup-<YYYYMMDDHHMMSS>`.
pub fn backup_path_for(install_path: &Path, now: DateTime<Utc>) -> PathBuf {
    let mut name = install_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(BACKUP_MARKER);
    name.push(now.format(BACKUP_TIMESTAMP).to_string());
    install_path.with_file_name(name)
}

/// Backups of `install_path` as `(timestamp, path)`, in no particular order.
async fn list_backups(install_path: &Path) -> Result<Vec<(String, PathBuf)>> {
    let (Some(parent), Some(file_name)) = (install_path.parent(), install_path.file_name()) else {
        return Ok(Vec::new());
    };
    let prefix = format!("{}{BACKUP_MARKER}", file_name.to_string_lossy());

    let mut entries = match tokio::fs::read_dir(parent).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(UpdateError::io("list", parent, &e)),
    };

    let mut backups = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| UpdateError::io("list", parent, &e))? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(stamp) = name.strip_prefix(&prefix) else {
            continue;
        };
        if stamp.len() != 14 || !stamp.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        backups.push((stamp.to_string(), entry.path()));
    }
    Ok(backups)
}

/// Most recent backup of `install_path`, if any.
pub async fn find_latest_backup(install_path: &Path) -> Result<Option<PathBuf>> {
    let backups = list_backups(install_path).await?;
    Ok(backups.into_iter().max_by(|a, b| a.0.cmp(&b.0)).map(|(_, path)| path))
}

/// Restore the most recent backup over `install_path`.
///
/// Returns the backup that was restored.
pub async fn rollback_from_backup(install_path: &Path, mover: Arc<dyn FileMover>) -> Result<PathBuf> {
    let Some(backup) = find_latest_backup(install_path).await? else {
        return Err(UpdateError::Io {
            operation: "roll back".to_string(),
            path: install_path.display().to_string(),
            message: "no backup found".to_string(),
        });
    };

    info!("Rolling back {} from {}", install_path.display(), backup.display());
    BackupManager::with_backup(install_path.to_path_buf(), backup.clone(), mover)
        .restore_backup()
        .await?;
    Ok(backup)
}
