//! `install` command.

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use std::io::{BufRead, Write};

use crate::core::UpdateError;
use crate::upgrade::{
    CheckOutcome, CheckTrigger, CompletionAction, InstallMode, InstallOutcome, Updater,
};
use crate::utils::progress::InstallProgressBar;

/// Download, verify and install the newer release.
#[derive(Args, Debug)]
pub struct InstallCommand {
    /// Restart into the new version without asking.
    #[arg(short, long)]
    pub yes: bool,
}

impl InstallCommand {
    /// Run the command.
    pub async fn execute(self, updater: &Updater) -> Result<()> {
        println!("{}", "Checking for updates...".cyan());
        let release = match updater.check(CheckTrigger::Manual).await {
            CheckOutcome::UpdateAvailable(release) | CheckOutcome::Suppressed(release) => release,
            CheckOutcome::Failed(e) => bail!(e),
            other => return super::check::report(updater, other),
        };

        println!(
            "{}",
            format!("Installing {} (current {})", release.version, updater.current_version()).cyan()
        );

        let bar = InstallProgressBar::new(&release.version);
        let mut status = updater.subscribe();
        let progress_bar = &bar;
        let render = async move {
            while status.changed().await.is_ok() {
                let install = status.borrow_and_update().install.clone();
                progress_bar.update(&install);
            }
        };

        let outcome = tokio::select! {
            outcome = updater.install(InstallMode::Interactive) => outcome,
            // The channel only closes when the updater is dropped.
            () = render => Err(UpdateError::Cancelled),
        };

        let outcome = match outcome {
            Ok(outcome) => {
                bar.finish("installed");
                outcome
            }
            Err(e) => {
                bar.clear();
                if e.is_fatal_to_install() {
                    println!("{}", "The update could not be verified or installed here".yellow());
                }
                if !matches!(e, UpdateError::Cancelled) {
                    println!("{}", "Opened the release page for a manual download".yellow());
                }
                return Err(e).context("Install failed");
            }
        };

        if let InstallOutcome::AwaitingCompletion {
            backup,
        } = &outcome
        {
            println!("{}", format!("Installed {}", release.version).green());
            println!("Previous version kept at {}", backup.display());
        }

        let action = if self.yes || ask_restart()? {
            CompletionAction::RestartNow
        } else {
            CompletionAction::CloseNow
        };
        updater.complete(action)?;
        Ok(())
    }
}

fn ask_restart() -> Result<bool> {
    print!("Restart into the new version now? [Y/n] ");
    std::io::stdout().flush().ok();

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer).context("Failed to read answer")?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer.is_empty() || answer == "y" || answer == "yes")
}
