//! Configuration management.
//!
//! - [`updater`] - static release-source and install-location settings
//!   loaded from `config.toml`

pub mod updater;

pub use updater::{UpdaterConfig, enclosing_bundle};
