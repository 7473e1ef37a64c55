//! Process and desktop-shell operations used at the end of an install.

use std::path::Path;
use std::process::Command;
use tracing::{info, warn};

use crate::core::{Result, UpdateError};

/// Relaunch, exit and URL opening.
pub trait SystemShell: Send + Sync {
    /// Start the freshly installed bundle as a new process.
    fn relaunch(&self, bundle: &Path) -> Result<()>;

    /// End the current process. Production implementations do not return.
    fn terminate(&self, code: i32);

    /// Open `url` in the user's browser.
    fn open_url(&self, url: &str) -> Result<()>;
}

/// [`SystemShell`] for the real desktop.
#[derive(Debug, Clone, Default)]
pub struct DesktopShell;

impl SystemShell for DesktopShell {
    fn relaunch(&self, bundle: &Path) -> Result<()> {
        info!("Relaunching {}", bundle.display());

        let mut command = if cfg!(target_os = "macos") {
            let mut open = Command::new("open");
            open.arg("-n").arg(bundle);
            open
        } else {
            Command::new(bundle)
        };

        command.spawn().map(|_| ()).map_err(|e| UpdateError::InstallUnsupported {
            reason: format!("failed to relaunch {}: {e}", bundle.display()),
        })
    }

    fn terminate(&self, code: i32) {
        info!("Exiting with code {}", code);
        std::process::exit(code);
    }

    fn open_url(&self, url: &str) -> Result<()> {
        open::that(url).map_err(|e| {
            warn!("Could not open {}: {}", url, e);
            UpdateError::Io {
                operation: "open".to_string(),
                path: url.to_string(),
                message: e.to_string(),
            }
        })
    }
}
