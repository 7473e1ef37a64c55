//! Self-update of an installed application bundle.
//!
//! This module discovers new releases on the release-hosting provider, decides
//! whether to tell the user, and replaces the installed bundle with a verified
//! new one. The install path is the highest-risk code in the crate: it moves
//! the running application, so every step either completes or leaves the
//! previous bundle in place.
//!
//! # Architecture Overview
//!
//! ## Core Components
//!
//! - **[`Updater`]**: orchestrator owning every piece below
//! - **[`fetcher::ReleaseFetcher`]**: conditional release fetch and origin checks
//! - **[`breaker::CircuitBreaker`]** and **[`scheduler::Scheduler`]**: when checks run
//! - **[`verification::ChecksumVerifier`]** and **[`signing::SignatureVerifier`]**:
//!   artifact integrity and publisher identity
//! - **[`installer::InstallPipeline`]** with **[`backup::BackupManager`]**: the
//!   download, verify, unpack, swap state machine
//! - **[`status::StatusPublisher`]**: the observable status UI code subscribes to
//! - **[`state::StateStore`]**: what survives a restart
//!
//! ## Update Process Flow
//!
//! ```text
//! 1. Check
//!    ├── Skip automatic checks inside a pause window (no network)
//!    ├── GET latest release with If-None-Match
//!    ├── 304 → cached release, 403 rate limit → pause
//!    └── Reject drafts, prereleases and foreign origins
//!
//! 2. Decide
//!    ├── Manual: always surface a newer release
//!    └── Automatic: respect skip/remind, or install directly with auto-download
//!
//! 3. Install
//!    ├── Download into a scoped temp dir
//!    ├── Verify SHA-256 from the release notes
//!    ├── Unpack and locate the bundle
//!    ├── Verify signing team against the running application
//!    └── Move installed bundle aside, move new bundle in, roll back on failure
//!
//! 4. Complete
//!    ├── Interactive: wait for restart-now or close-now
//!    └── Automatic: relaunch and exit
//! ```
//!
//! # Injected Seams
//!
//! Network ([`transport::HttpTransport`]), extraction
//! ([`archive::ArchiveExtractor`]), code signing ([`signing::CodeSigning`]),
//! filesystem moves ([`backup::FileMover`]) and process control
//! ([`platform::SystemShell`]) are traits, so the state machine runs in tests
//! against the fakes in `test_utils`.
//!
//! # Example
//!
//! ```rust,no_run
//! use bundle_updater::config::UpdaterConfig;
//! use bundle_updater::upgrade::{CheckOutcome, CheckTrigger, InstallMode, Updater};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpdaterConfig::load().await?;
//! let updater = Updater::from_config(&config)?;
//! if let CheckOutcome::UpdateAvailable(release) = updater.check(CheckTrigger::Manual).await {
//!     println!("Installing {}", release.version);
//!     updater.install(InstallMode::Interactive).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod archive;
/// Timestamped backups and the rollback-safe swap.
pub mod backup;
pub mod breaker;
pub mod fetcher;
pub mod installer;
pub mod platform;
/// Release metadata and asset selection.
pub mod release;
pub mod scheduler;
pub mod signing;
pub mod state;
pub mod status;
pub mod transport;
pub mod updater;
/// Content integrity of downloaded artifacts.
pub mod verification;

pub use breaker::{CheckTrigger, CircuitBreaker};
pub use installer::{InstallMode, InstallOutcome};
pub use release::ReleaseInfo;
pub use state::{CheckInterval, Preferences, UpdateState};
pub use status::{InstallPhase, InstallState, StatusSnapshot, UpdateStatus};
pub use updater::{CheckOutcome, CompletionAction, Updater};
pub use verification::ChecksumVerifier;
