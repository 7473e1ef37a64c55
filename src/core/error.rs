//! Error handling for the updater.
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** ([`UpdateError`]) so the scheduler and install
//!    pipeline can decide what to do with a failure (pause, retry later, fall
//!    back to manual download).
//! 2. **User-friendly messages** ([`ErrorContext`]) with an actionable
//!    suggestion for whoever is looking at the terminal or status panel.
//!
//! # Error Categories
//!
//! - **Release trust**: [`UpdateError::InvalidReleaseSource`],
//!   [`UpdateError::DraftRejected`], [`UpdateError::PrereleaseRejected`]
//! - **Network**: [`UpdateError::RateLimited`], [`UpdateError::Http`],
//!   [`UpdateError::Transport`], [`UpdateError::MissingCachedRelease`]
//! - **Artifact trust**: [`UpdateError::ChecksumMissing`],
//!   [`UpdateError::ChecksumMismatch`], [`UpdateError::InvalidCodeSignature`]
//! - **Install**: [`UpdateError::NoDownloadAsset`],
//!   [`UpdateError::InstallUnsupported`]
//! - **Local**: [`UpdateError::Io`], [`UpdateError::Config`],
//!   [`UpdateError::StateStore`], [`UpdateError::Decode`]
//!
//! [`UpdateError`] is `Clone` because the last failure is kept inside the
//! published status snapshot that UI consumers read.

use chrono::{DateTime, Utc};
use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, UpdateError>;

/// Every failure the update subsystem can report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// Release metadata or asset URL did not point at the expected
    /// owner/repository on a trusted host.
    #[error("Release source could not be authenticated: {reason}")]
    InvalidReleaseSource {
        /// What failed to match
        reason: String,
    },

    /// The latest release is marked as a prerelease.
    #[error("Release {version} is a prerelease and is not eligible for update")]
    PrereleaseRejected {
        /// Tag of the rejected release
        version: String,
    },

    /// The latest release is still a draft.
    #[error("Release {version} is a draft and is not eligible for update")]
    DraftRejected {
        /// Tag of the rejected release
        version: String,
    },

    /// The release API refused the request because the rate limit is exhausted.
    #[error("Release API rate limit exceeded, retry after {until}")]
    RateLimited {
        /// When automatic checks may resume
        until: DateTime<Utc>,
    },

    /// Server answered `304 Not Modified` but nothing was cached locally.
    #[error("Server reported no changes but no cached release is available")]
    MissingCachedRelease,

    /// The install could not be carried out on this machine.
    #[error("Automatic install is not possible: {reason}")]
    InstallUnsupported {
        /// Human readable cause
        reason: String,
    },

    /// Release notes carry no SHA-256 for the chosen asset.
    #[error("No SHA-256 checksum for '{asset}' found in the release notes")]
    ChecksumMissing {
        /// Asset the checksum was searched for
        asset: String,
    },

    /// Downloaded artifact hash does not match the published one.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Digest published in the release notes
        expected: String,
        /// Digest of the downloaded file
        actual: String,
    },

    /// Code signature of the new bundle is invalid or from another publisher.
    #[error("Code signature check failed: {reason}")]
    InvalidCodeSignature {
        /// What failed to verify or match
        reason: String,
    },

    /// The cached release has no installable asset.
    #[error("The release has no downloadable asset for this platform")]
    NoDownloadAsset,

    /// Non-2xx HTTP status that is not otherwise handled.
    #[error("HTTP request to {url} failed with status {status}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Request URL
        url: String,
    },

    /// Connection, TLS or timeout failure.
    #[error("Network error: {0}")]
    Transport(String),

    /// Response body could not be decoded.
    #[error("Failed to decode release payload: {0}")]
    Decode(String),

    /// Local filesystem operation failed.
    #[error("Failed to {operation} {path}: {message}")]
    Io {
        /// Operation that failed (e.g. "move")
        operation: String,
        /// Path involved
        path: String,
        /// Underlying error message
        message: String,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// The persisted update state could not be read or written.
    #[error("Update state error: {message}")]
    StateStore {
        /// Description of the problem
        message: String,
    },

    /// The operation was cancelled before it finished.
    #[error("Update operation cancelled")]
    Cancelled,
}

impl UpdateError {
    /// Build an [`UpdateError::Io`] from a std error.
    pub fn io(operation: &str, path: &std::path::Path, err: &std::io::Error) -> Self {
        Self::Io {
            operation: operation.to_string(),
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    /// Network-class failures that only mean "try again later".
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Http { .. }
                | Self::Transport(_)
                | Self::MissingCachedRelease
        )
    }

    /// Failures that end an install attempt and must never be retried
    /// automatically.
    pub fn is_fatal_to_install(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMissing { .. }
                | Self::ChecksumMismatch { .. }
                | Self::InvalidCodeSignature { .. }
                | Self::InstallUnsupported { .. }
                | Self::NoDownloadAsset
        )
    }
}

impl From<std::io::Error> for UpdateError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            operation: "access".to_string(),
            path: "unknown".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for UpdateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for UpdateError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Http {
                status: status.as_u16(),
                url: err.url().map(ToString::to_string).unwrap_or_default(),
            },
            None => Self::Transport(err.to_string()),
        }
    }
}

/// An [`UpdateError`] with a suggestion and optional details for display.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: UpdateError,
    /// What the user can do about it
    pub suggestion: Option<String>,
    /// Extra explanation
    pub details: Option<String>,
}

impl ErrorContext {
    /// Wrap an error with no suggestion or details.
    #[must_use]
    pub const fn new(error: UpdateError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Attach a suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Attach the standard suggestion for an [`UpdateError`].
pub fn create_error_context(error: UpdateError) -> ErrorContext {
    let ctx = ErrorContext::new(error.clone());
    match error {
        UpdateError::InvalidReleaseSource { .. } => ctx
            .with_suggestion("Download the update manually from the project's release page")
            .with_details(
                "The release metadata or download URL does not point at the official repository. \
                 A proxy or tampered response may be involved",
            ),
        UpdateError::DraftRejected { .. } | UpdateError::PrereleaseRejected { .. } => ctx
            .with_details("Only fully published releases are offered as updates"),
        UpdateError::RateLimited { .. } => ctx
            .with_suggestion("Wait until the rate limit resets; automatic checks resume on their own")
            .with_details("Unauthenticated API requests are limited per IP address"),
        UpdateError::MissingCachedRelease => ctx
            .with_suggestion("Run the check again; the local cache will be rebuilt"),
        UpdateError::InstallUnsupported { .. } => ctx
            .with_suggestion("Use the manual download from the release page instead")
            .with_details("This is most likely a permissions problem on the install location"),
        UpdateError::ChecksumMissing { .. } | UpdateError::ChecksumMismatch { .. } => ctx
            .with_suggestion("Download the update manually and verify it before installing")
            .with_details("The downloaded artifact was discarded because its integrity could not be proven"),
        UpdateError::InvalidCodeSignature { .. } => ctx
            .with_suggestion("Do not install this artifact; report it to the publisher")
            .with_details("The downloaded application is not signed by the same publisher as the running one"),
        UpdateError::NoDownloadAsset => ctx
            .with_suggestion("Check the release page for a build matching this platform"),
        UpdateError::Http { .. } | UpdateError::Transport(_) => ctx
            .with_suggestion("Check your network connection and try again"),
        UpdateError::Decode(_) => ctx
            .with_details("The release API returned a payload in an unexpected format"),
        UpdateError::Io { .. } => ctx
            .with_suggestion("Check permissions on the install location and temporary directory"),
        UpdateError::Config { .. } => ctx
            .with_suggestion("Fix the configuration file or remove it to fall back to defaults"),
        UpdateError::StateStore { .. } => ctx
            .with_suggestion("Delete the update state file; it is rebuilt on the next check"),
        UpdateError::Cancelled => ctx,
    }
}

/// Convert any error into an [`ErrorContext`] for display.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(update_error) = error.downcast_ref::<UpdateError>() {
        return create_error_context(update_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ErrorContext::new(UpdateError::Io {
            operation: "access".to_string(),
            path: "unknown".to_string(),
            message: io_error.to_string(),
        })
        .with_suggestion("Check file ownership or run with sufficient permissions");
    }

    let message = format!("{error:#}");
    ErrorContext::new(UpdateError::Config {
        message,
    })
}
