//! Terminal progress for the install command.
//!
//! Progress bars are hidden when `BUNDLE_UPDATER_NO_PROGRESS` is set, so
//! scripted runs get clean output.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};

use crate::upgrade::status::InstallState;

/// Environment variable disabling progress bars.
pub const NO_PROGRESS_ENV_VAR: &str = "BUNDLE_UPDATER_NO_PROGRESS";

fn is_progress_disabled() -> bool {
    std::env::var(NO_PROGRESS_ENV_VAR).is_ok()
}

/// Percent bar rendering an [`InstallState`].
pub struct InstallProgressBar {
    inner: IndicatifBar,
}

impl InstallProgressBar {
    /// Bar prefixed with `prefix`.
    pub fn new(prefix: &str) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(100);
            if let Ok(style) = IndicatifStyle::default_bar()
                .template("{prefix:.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            {
                bar.set_style(style.progress_chars("━╸━"));
            }
            bar
        };
        bar.set_prefix(prefix.to_string());
        Self {
            inner: bar,
        }
    }

    /// Render `state`.
    pub fn update(&self, state: &InstallState) {
        self.inner.set_position((state.progress * 100.0).round() as u64);
        let message = match &state.message {
            Some(detail) => format!("{} {}", state.phase.label(), detail),
            None => state.phase.label().to_string(),
        };
        self.inner.set_message(message);
    }

    /// Complete and keep the final line.
    pub fn finish(&self, message: &str) {
        self.inner.set_position(100);
        self.inner.finish_with_message(message.to_string());
    }

    /// Remove the bar.
    pub fn clear(&self) {
        self.inner.finish_and_clear();
    }
}
