//! `rollback` command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::upgrade::Updater;

/// Restore the most recent backup of the installed bundle.
#[derive(Args, Debug)]
pub struct RollbackCommand {}

impl RollbackCommand {
    /// Run the command.
    pub async fn execute(self, updater: &Updater) -> Result<()> {
        println!("{}", "Rolling back to previous version...".yellow());
        let backup = updater.rollback().await.context("Failed to restore from backup")?;
        println!(
            "{}",
            format!("Restored {} from {}", updater.install_path().display(), backup.display()).green()
        );
        Ok(())
    }
}
