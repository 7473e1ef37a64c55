//! Command-line interface for the updater.
//!
//! # Command Structure
//!
//! ```text
//! bundle-updater [--verbose | --quiet] [--config PATH] [--no-progress] <COMMAND>
//! ```
//!
//! | Command    | What it does                                           |
//! |------------|--------------------------------------------------------|
//! | `check`    | Check for a newer release now                          |
//! | `status`   | Show versions, pause window, deferrals and preferences |
//! | `install`  | Download, verify and install the newer release         |
//! | `skip`     | Skip the pending release                               |
//! | `remind`   | Defer automatic prompts                                |
//! | `watch`    | Run the background check loop until Ctrl-C             |
//! | `prefs`    | Show or change auto-check, interval, auto-download     |
//! | `rollback` | Restore the most recent backup                         |
//!
//! # Logging
//!
//! Diagnostics go to stderr through `tracing`. `RUST_LOG` wins when set;
//! otherwise `--verbose` selects `debug`, `--quiet` selects `error` and the
//! default is `info`.

mod check;
mod defer;
mod install;
mod prefs;
mod rollback;
mod status;
mod watch;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::UpdaterConfig;
use crate::constants::CONFIG_ENV_VAR;
use crate::upgrade::Updater;
use crate::utils::progress::NO_PROGRESS_ENV_VAR;

pub use check::CheckCommand;
pub use defer::{RemindCommand, SkipCommand};
pub use install::InstallCommand;
pub use prefs::{PrefsCommand, Toggle};
pub use rollback::RollbackCommand;
pub use status::StatusCommand;
pub use watch::WatchCommand;

/// Runtime settings derived from global flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Hide progress bars.
    pub no_progress: bool,
    /// Configuration file override.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Install the global `tracing` subscriber writing to stderr.
    pub fn init_logging(&self) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(&self.log_level)
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    /// Apply flags that are read through the environment. Must run before
    /// the async runtime or any other thread starts.
    pub fn apply_to_env(&self) {
        if self.no_progress {
            // SAFETY: the caller is still single-threaded.
            unsafe { std::env::set_var(NO_PROGRESS_ENV_VAR, "1") };
        }
    }
}

/// Keeps an installed application bundle up to date.
#[derive(Parser, Debug)]
#[command(
    name = "bundle-updater",
    version,
    about = "Check for, verify and install application updates from GitHub releases"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug output.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file to use instead of the default location.
    #[arg(long, global = true, env = CONFIG_ENV_VAR, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Disable progress bars.
    #[arg(long, global = true)]
    no_progress: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check for a newer release now.
    Check(CheckCommand),
    /// Show update status and preferences.
    Status(StatusCommand),
    /// Install the newer release.
    Install(InstallCommand),
    /// Skip the pending release.
    Skip(SkipCommand),
    /// Stop automatic prompts for a while.
    Remind(RemindCommand),
    /// Run automatic checks in the foreground until Ctrl-C.
    Watch(WatchCommand),
    /// Show or change preferences.
    Prefs(PrefsCommand),
    /// Restore the most recent backup of the installed bundle.
    Rollback(RollbackCommand),
}

impl Cli {
    /// Run the parsed command. Environment flags are applied by the binary
    /// before the runtime starts, see [`CliConfig::apply_to_env`].
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();

        let updater_config = UpdaterConfig::load_with_optional(config.config_path.clone()).await?;
        let updater = Updater::from_config(&updater_config)?;
        self.command.execute(updater).await
    }

    /// Settings from the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };

        CliConfig {
            log_level: log_level.to_string(),
            no_progress: self.no_progress,
            config_path: self.config.clone(),
        }
    }
}

impl Commands {
    /// Dispatch to the command.
    pub async fn execute(self, updater: Arc<Updater>) -> Result<()> {
        match self {
            Self::Check(cmd) => cmd.execute(&updater).await,
            Self::Status(cmd) => cmd.execute(&updater).await,
            Self::Install(cmd) => cmd.execute(&updater).await,
            Self::Skip(cmd) => cmd.execute(&updater).await,
            Self::Remind(cmd) => cmd.execute(&updater).await,
            Self::Watch(cmd) => cmd.execute(&updater).await,
            Self::Prefs(cmd) => cmd.execute(&updater).await,
            Self::Rollback(cmd) => cmd.execute(&updater).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        let cli = Cli::parse_from(["bundle-updater", "--verbose", "check"]);
        assert_eq!(cli.build_config().log_level, "debug");

        let cli = Cli::parse_from(["bundle-updater", "status", "--quiet"]);
        assert_eq!(cli.build_config().log_level, "error");

        let cli = Cli::parse_from(["bundle-updater", "status"]);
        assert_eq!(cli.build_config().log_level, "info");
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["bundle-updater", "-v", "-q", "check"]).is_err());
    }

    #[test]
    fn test_config_flag() {
        let cli = Cli::parse_from(["bundle-updater", "--config", "/tmp/u.toml", "rollback"]);
        assert_eq!(cli.build_config().config_path, Some(PathBuf::from("/tmp/u.toml")));
    }

    #[test]
    fn test_no_progress_flag() {
        let cli = Cli::parse_from(["bundle-updater", "install", "--no-progress"]);
        assert!(cli.build_config().no_progress);

        let cli = Cli::parse_from(["bundle-updater", "install"]);
        assert!(!cli.build_config().no_progress);
    }

    #[test]
    fn test_check_open_flag() {
        let cli = Cli::parse_from(["bundle-updater", "check", "--open"]);
        assert!(matches!(cli.command, Commands::Check(CheckCommand { open: true })));
    }

    #[test]
    fn test_command_line_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
