use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::constants::HASH_CHUNK_SIZE;
use crate::core::{Result, UpdateError};

/// Any line carrying a `sha256: <digest>` marker.
const GENERIC_SHA256: &str = r"(?i)sha-?256\s*[:=]?\s*`?([0-9a-f]{64})\b";

/// A bare 64-hex-digit token.
const HEX_DIGEST: &str = r"(?i)\b([0-9a-f]{64})\b";

/// Verifies the integrity of a downloaded release artifact using SHA-256.
///
/// The expected digest is not fetched from a separate checksums file: it is
/// embedded in the release notes, either on a line naming the asset or behind
/// a generic `sha256:` marker. Artifacts without a published digest are never
/// installed.
///
/// # Security Benefits
///
/// - **Download Integrity**: Detects corrupted or truncated downloads
/// - **Tamper Detection**: Identifies artifacts swapped after publication
///
/// A matching digest does not say who produced the artifact; that is the job
/// of [`SignatureVerifier`](crate::upgrade::signing::SignatureVerifier).
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Extract the expected digest for `asset_name` from release notes.
    ///
    /// Lines mentioning the asset name win over the generic `sha256:` marker.
    /// The digest is returned lowercased.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bundle_updater::upgrade::verification::ChecksumVerifier;
    ///
    /// let notes = "Editor.zip 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";
    /// assert_eq!(
    ///     ChecksumVerifier::extract_expected(notes, "Editor.zip").as_deref(),
    ///     Some("9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")
    /// );
    /// ```
    pub fn extract_expected(notes: &str, asset_name: &str) -> Option<String> {
        let hex_digest = Regex::new(HEX_DIGEST).ok()?;
        let generic = Regex::new(GENERIC_SHA256).ok()?;

        if !asset_name.is_empty() {
            // The name must stand alone: `MyEditor.zip` or `Editor.zip.sig` do not name `Editor.zip`.
            let names_asset = Regex::new(&format!(
                r"(?:^|[\s`*:|]){}(?:$|[\s`*:|,])",
                regex::escape(asset_name)
            ))
            .ok()?;
            let asset_line = notes
                .lines()
                .filter(|line| names_asset.is_match(line))
                .find_map(|line| hex_digest.captures(line));
            if let Some(captures) = asset_line {
                debug!("Found checksum for {} on its own line", asset_name);
                return Some(captures[1].to_lowercase());
            }
        }

        generic.captures(notes).map(|captures| {
            debug!("Using generic sha256 marker from release notes");
            captures[1].to_lowercase()
        })
    }

    /// Compute the hex SHA-256 of a file, reading it in fixed-size chunks.
    pub async fn compute_sha256(file_path: &Path) -> Result<String> {
        debug!("Computing SHA256 checksum for: {}", file_path.display());

        let mut file = tokio::fs::File::open(file_path)
            .await
            .map_err(|e| UpdateError::io("open", file_path, &e))?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

        loop {
            let read = file.read(&mut buffer).await.map_err(|e| UpdateError::io("read", file_path, &e))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Verify a file against an expected digest.
    ///
    /// Comparison ignores case. A `sha256:` prefix on `expected_checksum` is
    /// accepted.
    pub async fn verify_checksum(file_path: &Path, expected_checksum: &str) -> Result<()> {
        info!("Verifying checksum for: {}", file_path.display());

        let expected = expected_checksum.trim();
        let expected = expected.strip_prefix("sha256:").unwrap_or(expected).to_lowercase();
        let actual = Self::compute_sha256(file_path).await?;

        if actual != expected {
            warn!("Checksum mismatch for {}", file_path.display());
            return Err(UpdateError::ChecksumMismatch {
                expected,
                actual,
            });
        }

        info!("Checksum verification successful");
        Ok(())
    }

    /// Look up the digest for `asset_name` in `notes` and verify `file_path`.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::ChecksumMissing`] when the notes carry no digest
    /// - [`UpdateError::ChecksumMismatch`] when the file does not match
    pub async fn verify_release_asset(file_path: &Path, notes: &str, asset_name: &str) -> Result<()> {
        let Some(expected) = Self::extract_expected(notes, asset_name) else {
            warn!("Release notes carry no checksum for {}", asset_name);
            return Err(UpdateError::ChecksumMissing {
                asset: asset_name.to_string(),
            });
        };
        Self::verify_checksum(file_path, &expected).await
    }
}
