//! `watch` command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::upgrade::{UpdateStatus, Updater};

/// Run automatic checks in the foreground until interrupted.
#[derive(Args, Debug)]
pub struct WatchCommand {}

impl WatchCommand {
    /// Run the command.
    pub async fn execute(self, updater: &Updater) -> Result<()> {
        let state = updater.state().await?;
        if !state.auto_check_enabled {
            println!(
                "{}",
                "Automatic checks are off. Enable them with `bundle-updater prefs --auto-check on`".yellow()
            );
            return Ok(());
        }

        updater.start_scheduler().await?;
        println!(
            "{}",
            format!("Checking for updates {} (Ctrl-C to stop)", state.check_interval).cyan()
        );

        let mut status = updater.subscribe();
        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal.context("Failed to listen for Ctrl-C")?;
                    break;
                }
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = status.borrow_and_update().clone();
                    match snapshot.status {
                        UpdateStatus::UpdateAvailable => {
                            if let Some(release) = &snapshot.release {
                                println!("{}", format!("Update available: {}", release.version).green());
                            }
                        }
                        UpdateStatus::Failed => {
                            if let Some(error) = &snapshot.last_error {
                                println!("{}", format!("Check failed: {error}").red());
                            }
                        }
                        UpdateStatus::UpToDate => println!("Up to date"),
                        UpdateStatus::Idle | UpdateStatus::Checking => {}
                    }
                }
            }
        }

        updater.shutdown();
        println!("Stopped");
        Ok(())
    }
}
