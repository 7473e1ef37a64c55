//! `skip` and `remind` commands.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::time::Duration;

use crate::constants::DEFAULT_REMIND_LATER;
use crate::upgrade::Updater;

/// Skip the pending release; automatic checks stay quiet until a newer one.
#[derive(Args, Debug)]
pub struct SkipCommand {
    /// Forget skipped versions and reminders instead.
    #[arg(long)]
    pub clear: bool,
}

impl SkipCommand {
    /// Run the command.
    pub async fn execute(self, updater: &Updater) -> Result<()> {
        if self.clear {
            updater.clear_deferrals().await?;
            println!("{}", "Cleared skipped version and reminder".green());
            return Ok(());
        }

        match updater.skip_version().await? {
            Some(version) => println!("{}", format!("Skipping version {version}").green()),
            None => println!("No pending update to skip. Run `bundle-updater check` first"),
        }
        Ok(())
    }
}

/// Defer automatic update prompts.
#[derive(Args, Debug)]
pub struct RemindCommand {
    /// Hours to wait before prompting again.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_REMIND_LATER.as_secs() / 3600)]
    pub hours: u64,
}

impl RemindCommand {
    /// Run the command.
    pub async fn execute(self, updater: &Updater) -> Result<()> {
        let until = updater.remind_later(Duration::from_secs(self.hours * 3600)).await?;
        println!("{}", format!("Will remind you after {}", until.format("%Y-%m-%d %H:%M UTC")).green());
        Ok(())
    }
}
