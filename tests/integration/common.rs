//! Shared harness: an installed `Editor.app` at version 2.0.0 wired to fakes.

use bundle_updater::test_utils::{
    FakeExtractor, FakeShell, FakeSigning, FakeTransport, TEST_OWNER, TEST_REPO, checksum_notes,
    init_test_logging, release_json, test_config,
};
use bundle_updater::upgrade::backup::{FileMover, TokioMover};
use bundle_updater::upgrade::installer::InstallTools;
use bundle_updater::upgrade::state::StateStore;
use bundle_updater::upgrade::Updater;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const CURRENT_VERSION: &str = "2.0.0";
pub const TEAM: &str = "TEAM1234";
pub const ARCHIVE_BYTES: &[u8] = b"PK\x03\x04 editor 2.1.0 archive";

/// Download URL the release fixture advertises for `tag`.
pub fn asset_url(tag: &str) -> String {
    format!("https://github.com/{TEST_OWNER}/{TEST_REPO}/releases/download/{tag}/Editor.zip")
}

/// Contents of the `Contents/marker` file of `bundle`.
pub fn marker(bundle: &Path) -> String {
    std::fs::read_to_string(bundle.join("Contents/marker")).unwrap()
}

/// Siblings of the install path that look like backups.
pub fn backups(install_path: &Path) -> Vec<PathBuf> {
    let parent = install_path.parent().unwrap();
    let prefix = format!("{}.backup-", install_path.file_name().unwrap().to_string_lossy());
    std::fs::read_dir(parent)
        .unwrap()
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.file_name().is_some_and(|n| n.to_string_lossy().starts_with(&prefix)))
        .collect()
}

/// Leftover download/unpack work directories beside the install path.
pub fn work_dirs(install_path: &Path) -> Vec<PathBuf> {
    let parent = install_path.parent().unwrap();
    std::fs::read_dir(parent)
        .unwrap()
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.file_name().is_some_and(|n| n.to_string_lossy().starts_with(".bundle-update-")))
        .collect()
}

pub struct Harness {
    pub temp: TempDir,
    pub install_path: PathBuf,
    pub transport: Arc<FakeTransport>,
    pub extractor: Arc<FakeExtractor>,
    pub shell: Arc<FakeShell>,
    signing: Option<FakeSigning>,
    mover: Option<Arc<dyn FileMover>>,
    store: Option<StateStore>,
}

impl Harness {
    pub fn new() -> Self {
        init_test_logging(None);

        let temp = TempDir::new().unwrap();
        let install_path = temp.path().join("Applications").join("Editor.app");
        std::fs::create_dir_all(install_path.join("Contents")).unwrap();
        std::fs::write(install_path.join("Contents/marker"), "old").unwrap();

        Self {
            temp,
            install_path,
            transport: Arc::new(FakeTransport::new()),
            extractor: Arc::new(FakeExtractor::new("Editor.app", "new")),
            shell: Arc::new(FakeShell::default()),
            signing: None,
            mover: None,
            store: None,
        }
    }

    pub fn with_signing(mut self, build: impl FnOnce(&Path) -> FakeSigning) -> Self {
        self.signing = Some(build(&self.install_path));
        self
    }

    pub fn with_extractor(mut self, extractor: FakeExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn with_mover(mut self, mover: Arc<dyn FileMover>) -> Self {
        self.mover = Some(mover);
        self
    }

    pub fn with_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    /// State file inside the harness temp dir.
    pub fn state_path(&self) -> PathBuf {
        self.temp.path().join("state").join("update-state.json")
    }

    /// Queue a published `tag` whose notes carry the checksum of
    /// [`ARCHIVE_BYTES`], and serve those bytes for its asset.
    pub fn publish(&self, tag: &str) {
        self.publish_with_notes(tag, &checksum_notes("Editor.zip", ARCHIVE_BYTES));
    }

    pub fn publish_with_notes(&self, tag: &str, notes: &str) {
        self.transport.push_json(200, &release_json(tag, notes), Some("\"etag-1\""));
        self.transport.set_download(&asset_url(tag), ARCHIVE_BYTES.to_vec());
    }

    pub fn build(&mut self) -> Arc<Updater> {
        let config = test_config(CURRENT_VERSION, "https://api.github.com");
        let signing = self.signing.take().unwrap_or_else(|| FakeSigning::matching(&self.install_path, TEAM));
        let mover = self.mover.take().unwrap_or_else(|| Arc::new(TokioMover));
        let store = self.store.take().unwrap_or_else(StateStore::in_memory);

        let tools = InstallTools {
            transport: self.transport.clone(),
            extractor: self.extractor.clone(),
            signing: Arc::new(signing),
            mover,
            shell: self.shell.clone(),
        };
        Updater::new(&config, self.install_path.clone(), Arc::new(store), tools)
    }
}
