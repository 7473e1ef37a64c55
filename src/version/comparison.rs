//! Release version comparison.
//!
//! Release tags published by the hosting provider are loosely formatted:
//! `v2.1.0`, `2.1`, `2.1.0-beta.3`. The comparator here is deliberately more
//! forgiving than strict semver so that every tag ever published can be
//! ordered without a parse failure.
//!
//! # Rules
//!
//! - A single leading `v` (or `V`) is stripped.
//! - Everything from the first `-` onward is the prerelease suffix.
//! - The remaining dotted core is split on `.`; missing or non-numeric
//!   components count as `0`.
//! - Cores are compared component-wise.
//! - When cores are equal, a version with a prerelease suffix sorts *before*
//!   the same version without one. Two prerelease versions with equal cores
//!   compare equal.
//!
//! # Examples
//!
//! ```rust
//! use bundle_updater::version::comparison::VersionComparator;
//! use std::cmp::Ordering;
//!
//! assert_eq!(VersionComparator::compare("1.2.0", "1.10.0"), Ordering::Less);
//! assert_eq!(VersionComparator::compare("2.0.0-beta", "2.0.0"), Ordering::Less);
//! assert_eq!(VersionComparator::compare("v1.0.0", "1.0.0"), Ordering::Equal);
//! assert!(VersionComparator::is_newer("2.1.0", "2.0.0"));
//! ```

use std::cmp::Ordering;

/// Version comparison utilities for release tags.
///
/// All methods are pure and total: any two strings can be compared.
pub struct VersionComparator;

impl VersionComparator {
    /// Compare two version strings.
    ///
    /// Returns [`Ordering::Less`] when `a` is older than `b`,
    /// [`Ordering::Greater`] when it is newer and [`Ordering::Equal`] when the
    /// two describe the same release.
    pub fn compare(a: &str, b: &str) -> Ordering {
        let (core_a, pre_a) = Self::split(a);
        let (core_b, pre_b) = Self::split(b);

        let len = core_a.len().max(core_b.len());
        for idx in 0..len {
            let left = core_a.get(idx).copied().unwrap_or(0);
            let right = core_b.get(idx).copied().unwrap_or(0);
            match left.cmp(&right) {
                Ordering::Equal => {}
                other => return other,
            }
        }

        match (pre_a, pre_b) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => Ordering::Equal,
        }
    }

    /// Returns `true` when `candidate` is strictly newer than `current`.
    pub fn is_newer(candidate: &str, current: &str) -> bool {
        Self::compare(candidate, current) == Ordering::Greater
    }

    /// Normalize a release tag into the version string stored in
    /// [`ReleaseInfo`](crate::upgrade::release::ReleaseInfo).
    ///
    /// Trims whitespace and strips one leading `v`. The prerelease suffix is
    /// kept so that it still participates in comparison.
    pub fn normalize(tag: &str) -> String {
        let trimmed = tag.trim();
        trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed)
            .to_string()
    }

    fn split(version: &str) -> (Vec<u64>, bool) {
        let normalized = Self::normalize(version);
        let (core, prerelease) = match normalized.split_once('-') {
            Some((core, _)) => (core.to_string(), true),
            None => (normalized, false),
        };

        let components = core
            .split('.')
            .map(|part| part.trim().parse::<u64>().unwrap_or(0))
            .collect();

        (components, prerelease)
    }
}
