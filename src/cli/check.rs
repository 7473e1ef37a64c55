//! `check` command.

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;

use crate::upgrade::{CheckOutcome, CheckTrigger, Updater};

/// Check for a newer release now, ignoring pause windows and deferrals.
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Open the release page in the browser when an update is found.
    #[arg(long)]
    pub open: bool,
}

impl CheckCommand {
    /// Run the command.
    pub async fn execute(self, updater: &Updater) -> Result<()> {
        println!("{}", "Checking for updates...".cyan());
        let outcome = updater.check(CheckTrigger::Manual).await;
        let found = matches!(outcome, CheckOutcome::UpdateAvailable(_));
        report(updater, outcome)?;

        if self.open && found {
            updater.open_release_page().await.context("Failed to open the release page")?;
        }
        Ok(())
    }
}

/// Print a check outcome; failures become errors.
pub(crate) fn report(updater: &Updater, outcome: CheckOutcome) -> Result<()> {
    match outcome {
        CheckOutcome::UpdateAvailable(release) | CheckOutcome::Suppressed(release) => {
            println!(
                "{}",
                format!("Update available: {} -> {}", updater.current_version(), release.version).green()
            );
            if !release.title.is_empty() {
                println!("  {}", release.title.bold());
            }
            println!("  {}", release.release_url);
            println!("Run `bundle-updater install` to install it");
        }
        CheckOutcome::UpToDate => {
            println!(
                "{}",
                format!("You are on the latest version ({})", updater.current_version()).green()
            );
        }
        CheckOutcome::Paused {
            until,
        } => {
            println!("{}", format!("Automatic checks are paused until {until}").yellow());
        }
        CheckOutcome::AlreadyChecking => {
            println!("{}", "A check is already running".yellow());
        }
        CheckOutcome::Failed(e) => {
            if e.is_recoverable() {
                println!("{}", "The release server could not be reached; try again later".yellow());
            }
            bail!(e)
        }
    }
    Ok(())
}
