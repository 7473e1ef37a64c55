//! Shared utilities.
//!
//! - [`fs`] - async filesystem helpers with atomic writes
//! - [`progress`] - install progress bar

pub mod fs;
pub mod progress;

pub use fs::{atomic_write, ensure_dir, remove_path};
