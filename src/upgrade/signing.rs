//! Code-signing identity checks.
//!
//! The downloaded bundle must carry a valid signature from the same team as
//! the running application, and when the running application exposes a
//! bundle identifier the new one must match it too.
//!
//! Trust boundary: the identity of the *running* application is read from its
//! own signature and taken as the reference. A compromised running process
//! could report a forged identity; this module does not defend against that.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::core::{Result, UpdateError};

/// Publisher identity read from a code signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningIdentity {
    /// Signing team identifier.
    pub team_id: Option<String>,
    /// Bundle/application identifier.
    pub bundle_id: Option<String>,
}

/// Code-signing inspection utility.
#[async_trait]
pub trait CodeSigning: Send + Sync {
    /// `true` when the bundle's signature is structurally valid.
    async fn verify(&self, bundle: &Path) -> Result<bool>;

    /// Identity embedded in the bundle's signature, if readable.
    async fn read_identity(&self, bundle: &Path) -> Result<Option<SigningIdentity>>;
}

/// [`CodeSigning`] backed by the system `codesign` tool.
#[derive(Debug, Clone)]
pub struct CodesignTool {
    program: PathBuf,
}

impl Default for CodesignTool {
    fn default() -> Self {
        Self {
            program: PathBuf::from("codesign"),
        }
    }
}

impl CodesignTool {
    /// Use the `codesign` found on `PATH`.
    pub fn new() -> Self {
        which::which("codesign").map(Self::with_program).unwrap_or_default()
    }

    /// Use a specific executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl CodeSigning for CodesignTool {
    async fn verify(&self, bundle: &Path) -> Result<bool> {
        debug!("Verifying code signature of {}", bundle.display());
        let status = Command::new(&self.program)
            .args(["--verify", "--deep", "--strict"])
            .arg(bundle)
            .output()
            .await
            .map_err(|e| UpdateError::InstallUnsupported {
                reason: format!("cannot run {}: {e}", self.program.display()),
            })?
            .status;
        Ok(status.success())
    }

    async fn read_identity(&self, bundle: &Path) -> Result<Option<SigningIdentity>> {
        let output = Command::new(&self.program)
            .args(["-d", "--verbose=2"])
            .arg(bundle)
            .output()
            .await
            .map_err(|e| UpdateError::InstallUnsupported {
                reason: format!("cannot run {}: {e}", self.program.display()),
            })?;

        if !output.status.success() {
            return Ok(None);
        }

        // codesign prints the details on stderr.
        let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stdout));
        Ok(parse_identity(&text))
    }
}

/// Parse `TeamIdentifier=` and `Identifier=` lines.
pub fn parse_identity(text: &str) -> Option<SigningIdentity> {
    let mut identity = SigningIdentity::default();
    for line in text.lines().map(str::trim) {
        if let Some(team) = line.strip_prefix("TeamIdentifier=") {
            if team != "not set" && !team.is_empty() {
                identity.team_id = Some(team.to_string());
            }
        } else if let Some(id) = line.strip_prefix("Identifier=")
            && !id.is_empty()
        {
            identity.bundle_id = Some(id.to_string());
        }
    }

    if identity.team_id.is_none() && identity.bundle_id.is_none() {
        None
    } else {
        Some(identity)
    }
}

/// Compares a downloaded bundle's signature with the running application's.
pub struct SignatureVerifier {
    signing: Arc<dyn CodeSigning>,
}

impl SignatureVerifier {
    /// Verifier using `signing` for both bundles.
    pub fn new(signing: Arc<dyn CodeSigning>) -> Self {
        Self {
            signing,
        }
    }

    /// Require `candidate` to be validly signed by the same publisher as
    /// `running`.
    pub async fn verify(&self, candidate: &Path, running: &Path) -> Result<()> {
        if !self.signing.verify(candidate).await? {
            return Err(reject(format!("signature of {} is not valid", candidate.display())));
        }
        if !self.signing.verify(running).await? {
            return Err(reject("signature of the running application is not valid".to_string()));
        }

        let running_identity = self
            .signing
            .read_identity(running)
            .await?
            .ok_or_else(|| reject("cannot read the running application's signing identity".to_string()))?;
        let Some(expected_team) = running_identity.team_id else {
            return Err(reject("the running application has no signing team".to_string()));
        };

        let candidate_identity = self
            .signing
            .read_identity(candidate)
            .await?
            .ok_or_else(|| reject("cannot read the downloaded bundle's signing identity".to_string()))?;

        if candidate_identity.team_id.as_deref() != Some(expected_team.as_str()) {
            return Err(reject(format!(
                "team {} does not match running team {}",
                candidate_identity.team_id.as_deref().unwrap_or("<none>"),
                expected_team
            )));
        }

        if let Some(expected_id) = running_identity.bundle_id
            && candidate_identity.bundle_id.as_deref() != Some(expected_id.as_str())
        {
            return Err(reject(format!(
                "bundle identifier {} does not match {}",
                candidate_identity.bundle_id.as_deref().unwrap_or("<none>"),
                expected_id
            )));
        }

        info!("Code signature matches running application (team {})", expected_team);
        Ok(())
    }
}

fn reject(reason: String) -> UpdateError {
    warn!("Code signature rejected: {}", reason);
    UpdateError::InvalidCodeSignature {
        reason,
    }
}
