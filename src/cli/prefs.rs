//! `prefs` command.

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;

use crate::upgrade::{CheckInterval, Updater};

/// On/off switch for a preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    /// Enable.
    On,
    /// Disable.
    Off,
}

impl From<Toggle> for bool {
    fn from(toggle: Toggle) -> Self {
        toggle == Toggle::On
    }
}

/// Show or change update preferences.
#[derive(Args, Debug)]
pub struct PrefsCommand {
    /// Run automatic checks in the background.
    #[arg(long, value_enum, value_name = "on|off")]
    pub auto_check: Option<Toggle>,

    /// How often automatic checks run (hourly, daily, weekly).
    #[arg(long)]
    pub interval: Option<CheckInterval>,

    /// Install newer releases without asking.
    #[arg(long, value_enum, value_name = "on|off")]
    pub auto_download: Option<Toggle>,
}

impl PrefsCommand {
    /// Run the command.
    pub async fn execute(self, updater: &Updater) -> Result<()> {
        let mut prefs = updater.state().await?.preferences();
        let changed = self.auto_check.is_some() || self.interval.is_some() || self.auto_download.is_some();

        if let Some(toggle) = self.auto_check {
            prefs.auto_check_enabled = toggle.into();
        }
        if let Some(interval) = self.interval {
            prefs.check_interval = interval;
        }
        if let Some(toggle) = self.auto_download {
            prefs.auto_download_enabled = toggle.into();
        }

        if changed {
            updater.set_preferences(prefs).await?;
            // This process exits right away; the loop runs under `watch` or in the app.
            updater.stop_scheduler();
            println!("{}", "Preferences saved".green());
        }

        println!("auto-check:    {}", if prefs.auto_check_enabled { "on" } else { "off" });
        println!("interval:      {}", prefs.check_interval);
        println!("auto-download: {}", if prefs.auto_download_enabled { "on" } else { "off" });
        Ok(())
    }
}
