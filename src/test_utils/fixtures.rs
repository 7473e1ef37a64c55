//! Release fixtures for `acme/editor`.

use sha2::{Digest, Sha256};

use crate::config::UpdaterConfig;
use crate::upgrade::release::ReleaseInfo;
use crate::version::VersionComparator;

/// Repository owner used by fixtures.
pub const TEST_OWNER: &str = "acme";

/// Repository name used by fixtures.
pub const TEST_REPO: &str = "editor";

/// Configuration for `acme/editor` at `current_version`, talking to
/// `api_base`.
pub fn test_config(current_version: &str, api_base: &str) -> UpdaterConfig {
    UpdaterConfig {
        owner: TEST_OWNER.to_string(),
        repo: TEST_REPO.to_string(),
        app_name: "Editor".to_string(),
        asset_name: Some("Editor.zip".to_string()),
        current_version: Some(current_version.to_string()),
        api_base: api_base.to_string(),
        ..Default::default()
    }
}

/// Validated release `version` with an `Editor.zip` asset and no checksum.
pub fn sample_release(version: &str) -> ReleaseInfo {
    let version = VersionComparator::normalize(version);
    ReleaseInfo {
        title: format!("Editor {version}"),
        notes: String::new(),
        published_at: None,
        release_url: format!("https://github.com/{TEST_OWNER}/{TEST_REPO}/releases/tag/v{version}"),
        download_url: Some(format!(
            "https://github.com/{TEST_OWNER}/{TEST_REPO}/releases/download/v{version}/Editor.zip"
        )),
        asset_name: Some("Editor.zip".to_string()),
        version,
    }
}

/// Release notes listing the SHA-256 of `bytes` for `asset`.
pub fn checksum_notes(asset: &str, bytes: &[u8]) -> String {
    format!("## Changes\n\n- Faster startup\n\n## Checksums\n\n{asset}: {}\n", hex::encode(Sha256::digest(bytes)))
}

/// Published release payload as the API returns it.
pub fn release_json(tag: &str, notes: &str) -> String {
    release_json_flags(tag, notes, false, false)
}

/// Release payload with explicit draft/prerelease flags.
pub fn release_json_flags(tag: &str, notes: &str, draft: bool, prerelease: bool) -> String {
    serde_json::json!({
        "tag_name": tag,
        "name": format!("Editor {tag}"),
        "body": notes,
        "draft": draft,
        "prerelease": prerelease,
        "published_at": "2025-06-01T12:00:00Z",
        "html_url": format!("https://github.com/{TEST_OWNER}/{TEST_REPO}/releases/tag/{tag}"),
        "url": format!("https://api.github.com/repos/{TEST_OWNER}/{TEST_REPO}/releases/1001"),
        "assets": [
            {
                "name": "Editor.zip",
                "browser_download_url": format!(
                    "https://github.com/{TEST_OWNER}/{TEST_REPO}/releases/download/{tag}/Editor.zip"
                )
            },
            {
                "name": "Editor.zip.sig",
                "browser_download_url": format!(
                    "https://github.com/{TEST_OWNER}/{TEST_REPO}/releases/download/{tag}/Editor.zip.sig"
                )
            }
        ]
    })
    .to_string()
}
