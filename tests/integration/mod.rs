//! Integration test suite for bundle-updater
//!
//! End-to-end scenarios that drive [`bundle_updater::upgrade::Updater`]
//! through its public API against the fakes in `bundle_updater::test_utils`,
//! plus contract tests of the real HTTP transport against a local mock server.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **check_flow**: release discovery, caching and rejection of bad releases
//! - **circuit_breaker**: failure counting, pause windows and persistence
//! - **install_flow**: download, verify, swap and completion
//! - **install_failures**: every failure leaves the installed bundle intact
//! - **transport**: `ReqwestTransport` against wiremock
//! - **config**: configuration discovery through the environment

mod common;

mod check_flow;
mod circuit_breaker;
mod config;
mod install_failures;
mod install_flow;
mod transport;
