//! Constants used across the updater.
//!
//! Thresholds, cool-downs and trust anchors live here so the policy is in one
//! place and easy to audit.

use std::time::Duration;

/// Consecutive failed checks that open the circuit breaker.
pub const FAILURE_THRESHOLD: u32 = 3;

/// How long automatic checks stay paused once the breaker opens (1 hour).
pub const FAILURE_COOLDOWN: Duration = Duration::from_secs(60 * 60);

/// Pause applied on a rate-limit response that carries no reset time (1 hour).
pub const DEFAULT_RATE_LIMIT_PAUSE: Duration = Duration::from_secs(60 * 60);

/// Default "remind me later" deferral (24 hours).
pub const DEFAULT_REMIND_LATER: Duration = Duration::from_secs(24 * 60 * 60);

/// Chunk size used when streaming a file through SHA-256 (64 KiB).
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Timeout for a single release-metadata request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Timeout for an asset download.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Attempts made when restoring a backup during rollback.
pub const MAX_RESTORE_ATTEMPTS: u32 = 3;

/// Delay between restore attempts.
pub const RESTORE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Media type requested from the release API.
pub const RELEASE_MEDIA_TYPE: &str = "application/vnd.github+json";

/// Default base URL of the release API.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Host serving the human-facing release pages.
pub const RELEASE_WEB_HOST: &str = "github.com";

/// Hosts an asset download URL may point at.
pub const TRUSTED_DOWNLOAD_HOSTS: &[&str] = &[
    "github.com",
    "objects.githubusercontent.com",
    "release-assets.githubusercontent.com",
];

/// Archive suffixes accepted as installable artifacts, in preference order.
pub const ARCHIVE_SUFFIXES: &[&str] = &[".zip", ".tar.gz", ".tgz", ".dmg"];

/// Default extension of the application bundle inside the archive.
pub const DEFAULT_BUNDLE_EXTENSION: &str = "app";

/// File name of the persisted update state.
pub const STATE_FILE_NAME: &str = "update-state.json";

/// File name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable overriding the configuration path.
pub const CONFIG_ENV_VAR: &str = "BUNDLE_UPDATER_CONFIG";
