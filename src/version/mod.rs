//! Version handling for release tags.
//!
//! - [`comparison`] - prerelease-aware comparison of loosely formatted tags

pub mod comparison;

pub use comparison::VersionComparator;

use std::cmp::Ordering;

/// Compare two version strings. See [`VersionComparator::compare`].
pub fn compare(a: &str, b: &str) -> Ordering {
    VersionComparator::compare(a, b)
}

/// Returns `true` when `candidate` is strictly newer than `current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    VersionComparator::is_newer(candidate, current)
}
