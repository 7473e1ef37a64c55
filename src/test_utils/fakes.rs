//! In-memory implementations of the updater's seams.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::{Result, UpdateError};
use crate::upgrade::archive::ArchiveExtractor;
use crate::upgrade::backup::{FileMover, TokioMover};
use crate::upgrade::platform::SystemShell;
use crate::upgrade::signing::{CodeSigning, SigningIdentity};
use crate::upgrade::transport::{HttpRequest, HttpResponse, HttpTransport, ProgressFn};

/// Scripted [`HttpTransport`].
///
/// `get` pops queued responses in order and fails with a transport error when
/// the queue is empty. `download` serves bytes registered per URL.
#[derive(Default)]
pub struct FakeTransport {
    responses: Mutex<VecDeque<Result<HttpResponse>>>,
    downloads: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<HttpRequest>>,
    download_calls: AtomicUsize,
}

impl FakeTransport {
    /// Transport with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw response.
    pub fn push_response(&self, response: HttpResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue a JSON body with an optional ETag.
    pub fn push_json(&self, status: u16, body: &str, etag: Option<&str>) {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        if let Some(etag) = etag {
            headers.insert("etag".to_string(), etag.to_string());
        }
        self.push_response(HttpResponse {
            status,
            headers,
            body: body.as_bytes().to_vec(),
        });
    }

    /// Queue a bare status code.
    pub fn push_status(&self, status: u16) {
        self.push_response(HttpResponse {
            status,
            ..Default::default()
        });
    }

    /// Queue a `403` with an exhausted rate limit, resetting at `reset` (unix
    /// seconds) when given.
    pub fn push_rate_limited(&self, reset: Option<i64>) {
        let mut headers = HashMap::new();
        headers.insert("x-ratelimit-remaining".to_string(), "0".to_string());
        if let Some(reset) = reset {
            headers.insert("x-ratelimit-reset".to_string(), reset.to_string());
        }
        self.push_response(HttpResponse {
            status: 403,
            headers,
            body: b"{\"message\":\"API rate limit exceeded\"}".to_vec(),
        });
    }

    /// Queue a transport failure.
    pub fn push_error(&self, error: UpdateError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Serve `bytes` for downloads of `url`.
    pub fn set_download(&self, url: &str, bytes: Vec<u8>) {
        self.downloads.lock().unwrap().insert(url.to_string(), bytes);
    }

    /// Requests seen by `get`.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of `get` calls.
    pub fn get_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of `download` calls.
    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(UpdateError::Transport("no response queued".to_string())))
    }

    async fn download(&self, url: &str, dest: &Path, progress: ProgressFn<'_>) -> Result<u64> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let bytes = self.downloads.lock().unwrap().get(url).cloned();
        let Some(bytes) = bytes else {
            return Err(UpdateError::Http {
                status: 404,
                url: url.to_string(),
            });
        };

        let total = bytes.len() as u64;
        let half = bytes.len() / 2;
        tokio::fs::write(dest, &bytes).await.map_err(|e| UpdateError::io("write", dest, &e))?;
        progress(half as u64, Some(total));
        progress(total, Some(total));
        Ok(total)
    }
}

/// [`ArchiveExtractor`] that fabricates a bundle instead of unpacking.
pub struct FakeExtractor {
    bundle_name: String,
    marker: String,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeExtractor {
    /// Produces `<dest>/<bundle_name>/Contents/marker` containing `marker`.
    pub fn new(bundle_name: &str, marker: &str) -> Self {
        Self {
            bundle_name: bundle_name.to_string(),
            marker: marker.to_string(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Behaves like an extraction tool exiting non-zero.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("Editor.app", "")
        }
    }

    /// Number of extractions attempted.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveExtractor for FakeExtractor {
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(UpdateError::InstallUnsupported {
                reason: format!("extraction of {} exited with status 1", archive.display()),
            });
        }
        let contents = dest.join(&self.bundle_name).join("Contents");
        tokio::fs::create_dir_all(&contents).await.map_err(|e| UpdateError::io("create", &contents, &e))?;
        let marker = contents.join("marker");
        tokio::fs::write(&marker, &self.marker).await.map_err(|e| UpdateError::io("write", &marker, &e))
    }
}

/// [`CodeSigning`] answering from fixed identities.
///
/// The running bundle path gets the running identity; any other path is
/// treated as the downloaded candidate.
pub struct FakeSigning {
    running_path: PathBuf,
    running: Option<SigningIdentity>,
    candidate: Option<SigningIdentity>,
    candidate_valid: bool,
}

impl FakeSigning {
    /// Both bundles signed by `team` with the same bundle identifier.
    pub fn matching(running_path: &Path, team: &str) -> Self {
        let identity = SigningIdentity {
            team_id: Some(team.to_string()),
            bundle_id: Some("com.acme.editor".to_string()),
        };
        Self {
            running_path: running_path.to_path_buf(),
            running: Some(identity.clone()),
            candidate: Some(identity),
            candidate_valid: true,
        }
    }

    /// Candidate signed by another team.
    #[must_use]
    pub fn with_candidate_team(mut self, team: &str) -> Self {
        self.candidate = Some(SigningIdentity {
            team_id: Some(team.to_string()),
            bundle_id: Some("com.acme.editor".to_string()),
        });
        self
    }

    /// Candidate whose signature does not verify.
    #[must_use]
    pub fn with_invalid_candidate(mut self) -> Self {
        self.candidate_valid = false;
        self
    }

    fn is_running(&self, bundle: &Path) -> bool {
        bundle == self.running_path
    }
}

#[async_trait]
impl CodeSigning for FakeSigning {
    async fn verify(&self, bundle: &Path) -> Result<bool> {
        Ok(self.is_running(bundle) || self.candidate_valid)
    }

    async fn read_identity(&self, bundle: &Path) -> Result<Option<SigningIdentity>> {
        if self.is_running(bundle) {
            Ok(self.running.clone())
        } else {
            Ok(self.candidate.clone())
        }
    }
}

/// [`SystemShell`] that records instead of acting.
#[derive(Default)]
pub struct FakeShell {
    relaunched: Mutex<Vec<PathBuf>>,
    terminated: Mutex<Vec<i32>>,
    opened: Mutex<Vec<String>>,
}

impl FakeShell {
    /// Bundles relaunched.
    pub fn relaunched(&self) -> Vec<PathBuf> {
        self.relaunched.lock().unwrap().clone()
    }

    /// Exit codes requested.
    pub fn terminated(&self) -> Vec<i32> {
        self.terminated.lock().unwrap().clone()
    }

    /// URLs opened.
    pub fn opened_urls(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl SystemShell for FakeShell {
    fn relaunch(&self, bundle: &Path) -> Result<()> {
        self.relaunched.lock().unwrap().push(bundle.to_path_buf());
        Ok(())
    }

    fn terminate(&self, code: i32) {
        self.terminated.lock().unwrap().push(code);
    }

    fn open_url(&self, url: &str) -> Result<()> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// [`FileMover`] that fails selected calls and performs the rest for real.
pub struct FailingMover {
    fail_on: Vec<usize>,
    calls: AtomicUsize,
}

impl FailingMover {
    /// Fail the `n`-th rename (1-based).
    pub fn fail_on_call(n: usize) -> Self {
        Self::fail_on_calls(&[n])
    }

    /// Fail every listed rename (1-based).
    pub fn fail_on_calls(calls: &[usize]) -> Self {
        Self {
            fail_on: calls.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Renames attempted.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileMover for FailingMover {
    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on.contains(&call) {
            return Err(UpdateError::Io {
                operation: "move".to_string(),
                path: from.display().to_string(),
                message: format!("permission denied (injected failure on call {call})"),
            });
        }
        TokioMover.rename(from, to).await
    }
}
