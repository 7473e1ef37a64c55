//! Self-update orchestrator for desktop application bundles.
//!
//! `bundle-updater` keeps an installed application current with the releases
//! published on its GitHub repository. It finds new releases, decides whether
//! to bother the user, downloads the release archive, proves its integrity and
//! its publisher, and swaps the installed bundle for the new one with a backup
//! it can roll back to.
//!
//! # Architecture Overview
//!
//! - [`version`]: lenient version comparison (`v` prefix, prerelease ordering)
//! - [`config`]: static configuration naming the repository and install path
//! - [`upgrade`]: release fetch, circuit breaker, scheduler, verification,
//!   install pipeline and the observable status
//! - [`cli`]: the `bundle-updater` command line
//! - [`core`]: error types and user-facing error rendering
//!
//! # Trust Model
//!
//! A release is installed only when all of the following hold:
//!
//! 1. It is published (not a draft or prerelease) on the configured
//!    owner/repository.
//! 2. Its asset is served from a trusted host under that repository's
//!    `releases/download` path.
//! 3. The SHA-256 published in its notes matches the downloaded archive.
//! 4. The unpacked bundle is signed by the same team as the running
//!    application.
//!
//! # Example
//!
//! ```rust,no_run
//! use bundle_updater::config::UpdaterConfig;
//! use bundle_updater::upgrade::Updater;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpdaterConfig::load().await?;
//! let updater = Updater::from_config(&config)?;
//! updater.start_scheduler().await?;
//!
//! let mut status = updater.subscribe();
//! while status.changed().await.is_ok() {
//!     println!("{:?}", status.borrow().status);
//! }
//! # Ok(())
//! # }
//! ```

// Core functionality modules
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;

// Update subsystem
pub mod upgrade;

// Supporting modules
pub mod utils;
pub mod version;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
