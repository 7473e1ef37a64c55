//! Archive extraction and bundle lookup.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::core::{Result, UpdateError};

/// Local extraction utility.
#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    /// Unpack `archive` into the existing directory `dest`.
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<()>;
}

/// [`ArchiveExtractor`] shelling out to `ditto`, `unzip` or `tar`.
#[derive(Debug, Clone, Default)]
pub struct SystemExtractor;

impl SystemExtractor {
    /// Program and arguments for `archive`, or `None` for unsupported formats.
    fn command_for(archive: &Path, dest: &Path) -> Option<(PathBuf, Vec<String>)> {
        let name = archive.file_name()?.to_string_lossy().to_lowercase();
        let src = archive.display().to_string();
        let dst = dest.display().to_string();

        if name.ends_with(".zip") {
            // ditto keeps extended attributes and symlinks inside .app bundles.
            if let Ok(ditto) = which::which("ditto") {
                return Some((ditto, vec!["-x".into(), "-k".into(), src, dst]));
            }
            let unzip = which::which("unzip").ok()?;
            return Some((unzip, vec!["-q".into(), "-o".into(), src, "-d".into(), dst]));
        }
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            let tar = which::which("tar").ok()?;
            return Some((tar, vec!["-xzf".into(), src, "-C".into(), dst]));
        }
        None
    }
}

#[async_trait]
impl ArchiveExtractor for SystemExtractor {
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        let Some((program, args)) = Self::command_for(archive, dest) else {
            return Err(UpdateError::InstallUnsupported {
                reason: format!("no extraction tool available for {}", archive.display()),
            });
        };

        debug!("Running {} {:?}", program.display(), args);
        let output = Command::new(&program).args(&args).output().await.map_err(|e| {
            UpdateError::InstallUnsupported {
                reason: format!("cannot run {}: {e}", program.display()),
            }
        })?;

        if !output.status.success() {
            return Err(UpdateError::InstallUnsupported {
                reason: format!(
                    "{} exited with {}: {}",
                    program.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        info!("Extracted {}", archive.display());
        Ok(())
    }
}

/// First directory under `root` with the given extension, depth-first with
/// entries visited in name order.
pub fn locate_bundle(root: &Path, extension: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != "__MACOSX")
        .filter_map(std::result::Result::ok)
        .find(|entry| {
            entry.file_type().is_dir() && entry.path().extension().is_some_and(|ext| ext == extension)
        })
        .map(walkdir::DirEntry::into_path)
}
