//! Core types shared by every part of the updater.
//!
//! ## `error` - Error Handling
//!
//! - [`UpdateError`] - every failure mode of release discovery, verification
//!   and install
//! - [`ErrorContext`] - user-facing wrapper with suggestions and details
//! - [`user_friendly_error`] - convert any `anyhow::Error` for display

pub mod error;

pub use error::{ErrorContext, Result, UpdateError, create_error_context, user_friendly_error};
