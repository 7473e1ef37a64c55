//! Filesystem helpers.
//!
//! Small async wrappers used by the state store and the install pipeline.
//! Writes that must never leave a half-written file go through
//! [`atomic_write`]: the content lands in a sibling temp file which is then
//! renamed over the target, so readers see either the old or the new file.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::core::{Result, UpdateError};

/// Create `path` and its parents if missing.
pub async fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).await.map_err(|e| UpdateError::io("create directory", path, &e))?;
    } else if !path.is_dir() {
        return Err(UpdateError::Io {
            operation: "create directory".to_string(),
            path: path.display().to_string(),
            message: "path exists and is not a directory".to_string(),
        });
    }
    Ok(())
}

/// Write `content` to `path` via temp file and rename.
pub async fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_dir(parent).await?;
    }

    let temp_path = temp_sibling(path);
    {
        let mut file =
            fs::File::create(&temp_path).await.map_err(|e| UpdateError::io("create", &temp_path, &e))?;
        file.write_all(content).await.map_err(|e| UpdateError::io("write", &temp_path, &e))?;
        file.sync_all().await.map_err(|e| UpdateError::io("sync", &temp_path, &e))?;
    }

    fs::rename(&temp_path, path).await.map_err(|e| UpdateError::io("rename", path, &e))?;
    Ok(())
}

/// Remove a file or directory tree if present.
pub async fn remove_path(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(UpdateError::io("inspect", path, &e)),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path).await.map_err(|e| UpdateError::io("remove", path, &e))
    } else {
        fs::remove_file(path).await.map_err(|e| UpdateError::io("remove", path, &e))
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
