//! Release metadata: the wire payload and the validated [`ReleaseInfo`].
//!
//! [`ReleasePayload`] mirrors the JSON returned by the release API and is only
//! ever looked at by the fetcher. Everything downstream works on
//! [`ReleaseInfo`], which the fetcher builds after the payload passed every
//! trust check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::ARCHIVE_SUFFIXES;

/// A fully validated, published release.
///
/// Immutable once built. Cached verbatim in the persisted state so that a
/// `304 Not Modified` answer can be served without re-validating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    /// Normalized version, without the leading `v`.
    pub version: String,
    /// Display title of the release.
    pub title: String,
    /// Release notes; may embed SHA-256 digests of the assets.
    pub notes: String,
    /// Publication time, when reported.
    pub published_at: Option<DateTime<Utc>>,
    /// Human-facing release page.
    pub release_url: String,
    /// Download URL of the chosen asset.
    pub download_url: Option<String>,
    /// File name of the chosen asset.
    pub asset_name: Option<String>,
}

/// Release JSON as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleasePayload {
    /// Git tag of the release.
    pub tag_name: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Markdown body.
    #[serde(default)]
    pub body: Option<String>,
    /// Publication timestamp.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Unpublished draft.
    #[serde(default)]
    pub draft: bool,
    /// Marked as prerelease.
    #[serde(default)]
    pub prerelease: bool,
    /// Human-facing page.
    pub html_url: String,
    /// Canonical API URL of this release.
    pub url: String,
    /// Attached files.
    #[serde(default)]
    pub assets: Vec<AssetPayload>,
}

/// A single release asset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetPayload {
    /// File name.
    pub name: String,
    /// Public download URL.
    pub browser_download_url: String,
}

/// Pick the installable asset name out of `names`.
///
/// Preference order: exact `expected` name, then a name ending with
/// `expected`, then an archive whose name contains `app_name` (ignoring case
/// and punctuation), then any archive. Ties inside a tier go to the
/// lexicographically smallest name, so the input order never matters.
pub fn select_preferred<'a>(
    names: &[&'a str],
    expected: Option<&str>,
    app_name: &str,
) -> Option<&'a str> {
    let mut sorted: Vec<&'a str> = names.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    if let Some(expected) = expected {
        if let Some(exact) = sorted.iter().find(|name| **name == expected) {
            return Some(*exact);
        }
        let suffix = expected.to_lowercase();
        if let Some(found) = sorted.iter().find(|name| name.to_lowercase().ends_with(&suffix)) {
            return Some(*found);
        }
    }

    let needle = squash(app_name);
    if !needle.is_empty()
        && let Some(found) = sorted
            .iter()
            .find(|name| is_archive(name) && squash(name).contains(&needle))
    {
        return Some(*found);
    }

    // Prefer by archive suffix order, then by name.
    ARCHIVE_SUFFIXES.iter().find_map(|suffix| {
        sorted
            .iter()
            .find(|name| name.to_lowercase().ends_with(suffix))
            .copied()
    })
}

/// Pick the installable asset out of a release payload.
pub fn select_asset<'a>(
    assets: &'a [AssetPayload],
    expected: Option<&str>,
    app_name: &str,
) -> Option<&'a AssetPayload> {
    let names: Vec<&str> = assets.iter().map(|asset| asset.name.as_str()).collect();
    let chosen = select_preferred(&names, expected, app_name)?;
    assets.iter().find(|asset| asset.name == chosen)
}

fn is_archive(name: &str) -> bool {
    let lower = name.to_lowercase();
    ARCHIVE_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

fn squash(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
