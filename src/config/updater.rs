//! Static updater configuration (`config.toml`).
//!
//! The configuration names the release source and the install location. It is
//! written by whoever packages the application and rarely changes. User
//! preferences that the UI toggles (auto-check, interval, auto-download) are
//! kept in the persisted update state instead, see
//! [`UpdateState`](crate::upgrade::state::UpdateState).
//!
//! # Location
//!
//! - Unix/macOS: `~/.bundle-updater/config.toml`
//! - Windows: `%LOCALAPPDATA%\bundle-updater\config.toml`
//! - Override: `BUNDLE_UPDATER_CONFIG=/path/to/config.toml`
//!
//! # Example
//!
//! ```toml
//! owner = "example-org"
//! repo = "example-editor"
//! app_name = "Example Editor"
//! asset_name = "Example-Editor.zip"
//! bundle_extension = "app"
//! install_path = "/Applications/Example Editor.app"
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::constants::{
    CONFIG_ENV_VAR, CONFIG_FILE_NAME, DEFAULT_API_BASE, DEFAULT_BUNDLE_EXTENSION,
    DEFAULT_REQUEST_TIMEOUT_SECS, RELEASE_WEB_HOST, STATE_FILE_NAME,
};

/// Where releases come from and where the application is installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Repository owner on the release-hosting provider.
    #[serde(default = "default_owner")]
    pub owner: String,

    /// Repository name on the release-hosting provider.
    #[serde(default = "default_repo")]
    pub repo: String,

    /// Display name of the application, used in messages and the user agent.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Exact file name of the installable artifact, when releases publish one.
    ///
    /// Asset selection falls back to suffix and fuzzy matches when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_name: Option<String>,

    /// Extension of the application bundle inside the archive, without dot.
    #[serde(default = "default_bundle_extension")]
    pub bundle_extension: String,

    /// Installed application bundle to replace.
    ///
    /// Defaults to the bundle containing the running executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_path: Option<PathBuf>,

    /// Version of the installed application. Defaults to this crate's version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,

    /// Base URL of the release API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// `User-Agent` sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Timeout for release metadata requests, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Location of the persisted update state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            repo: default_repo(),
            app_name: default_app_name(),
            asset_name: None,
            bundle_extension: default_bundle_extension(),
            install_path: None,
            current_version: None,
            api_base: default_api_base(),
            user_agent: None,
            request_timeout_secs: default_request_timeout_secs(),
            state_path: None,
        }
    }
}

fn default_owner() -> String {
    "bundle-updater".to_string()
}

fn default_repo() -> String {
    "bundle-updater".to_string()
}

fn default_app_name() -> String {
    "bundle-updater".to_string()
}

fn default_bundle_extension() -> String {
    DEFAULT_BUNDLE_EXTENSION.to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl UpdaterConfig {
    /// Load from the default location, or defaults when no file exists.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path` when given, otherwise from [`Self::default_path`].
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };

        if path.exists() {
            Self::load_from(&path).await
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load and validate a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read updater config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse updater config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration, creating parent directories.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize updater config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write updater config to {}", path.display()))?;
        Ok(())
    }

    /// Default configuration path, honouring `BUNDLE_UPDATER_CONFIG`.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Ok(PathBuf::from(path));
        }
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    fn config_dir() -> Result<PathBuf> {
        let dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("bundle-updater")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".bundle-updater")
        };
        Ok(dir)
    }

    /// Reject values that would make origin checks meaningless.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("owner", &self.owner), ("repo", &self.repo)] {
            if value.is_empty() || value.contains('/') || value.contains(char::is_whitespace) {
                bail!("Invalid {field} '{value}': must be a single path segment");
            }
        }
        if self.bundle_extension.is_empty() || self.bundle_extension.starts_with('.') {
            bail!(
                "Invalid bundle_extension '{}': give the extension without a leading dot",
                self.bundle_extension
            );
        }
        Ok(())
    }

    /// Version of the installed application.
    pub fn current_version(&self) -> String {
        self.current_version
            .clone()
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
    }

    /// `User-Agent` header value.
    pub fn user_agent(&self) -> String {
        self.user_agent.clone().unwrap_or_else(|| {
            format!("{}/{} (self-update)", self.app_name.replace(' ', "-"), self.current_version())
        })
    }

    /// API endpoint for the latest release.
    pub fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base.trim_end_matches('/'),
            self.owner,
            self.repo
        )
    }

    /// Human-facing releases page, used as the manual-download fallback.
    pub fn releases_page_url(&self) -> String {
        format!("https://{RELEASE_WEB_HOST}/{}/{}/releases/latest", self.owner, self.repo)
    }

    /// Persisted state location.
    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.state_path {
            Some(path) => Ok(path.clone()),
            None => {
                let config_path = Self::default_path()?;
                let dir = config_path.parent().map(Path::to_path_buf).unwrap_or_default();
                Ok(dir.join(STATE_FILE_NAME))
            }
        }
    }

    /// Installed bundle to replace.
    ///
    /// Falls back to the nearest ancestor of the running executable with the
    /// bundle extension, then to the executable itself.
    pub fn install_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.install_path {
            return Ok(path.clone());
        }
        let exe = std::env::current_exe().context("Failed to get current executable path")?;
        Ok(enclosing_bundle(&exe, &self.bundle_extension).unwrap_or(exe))
    }
}

/// Nearest ancestor of `path` whose extension is `extension`.
pub fn enclosing_bundle(path: &Path, extension: &str) -> Option<PathBuf> {
    path.ancestors()
        .find(|ancestor| ancestor.extension().is_some_and(|ext| ext == extension))
        .map(Path::to_path_buf)
}
