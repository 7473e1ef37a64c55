//! `status` command.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::upgrade::Updater;
use crate::version::VersionComparator;

/// Show versions, pause window, deferrals and preferences from the stored
/// state. Does not contact the network.
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    /// Run the command.
    pub async fn execute(self, updater: &Updater) -> Result<()> {
        let state = updater.state().await?;
        let now = Utc::now();

        if self.json {
            let output = json!({
                "current_version": updater.current_version(),
                "install_path": updater.install_path(),
                "status": updater.status(),
                "state": state,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!("{} {}", "Current version:".bold(), updater.current_version());
        match &state.cached_release {
            Some(release) if VersionComparator::is_newer(&release.version, updater.current_version()) => {
                println!("{} {} {}", "Latest version: ".bold(), release.version, "(update available)".green());
            }
            Some(release) => println!("{} {}", "Latest version: ".bold(), release.version),
            None => println!("{} {}", "Latest version: ".bold(), "unknown".dimmed()),
        }
        println!("{} {}", "Install path:   ".bold(), updater.install_path().display());
        println!("{} {}", "Last checked:   ".bold(), format_time(state.last_checked_at));

        if state.is_paused(now) {
            println!("{} until {}", "Checks paused: ".yellow().bold(), format_time(state.pause_until));
        } else if state.consecutive_failures > 0 {
            println!("{} {}", "Failed checks:  ".yellow().bold(), state.consecutive_failures);
        }
        if let Some(skipped) = &state.skipped_version {
            println!("{} {}", "Skipped:        ".bold(), skipped);
        }
        if state.remind_until.is_some_and(|until| until > now) {
            println!("{} {}", "Remind after:   ".bold(), format_time(state.remind_until));
        }

        println!();
        println!("{} {}", "Auto-check:     ".bold(), on_off(state.auto_check_enabled));
        println!("{} {}", "Interval:       ".bold(), state.check_interval);
        println!("{} {}", "Auto-download:  ".bold(), on_off(state.auto_download_enabled));
        Ok(())
    }
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string())
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}
