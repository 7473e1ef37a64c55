//! Configuration discovery through `BUNDLE_UPDATER_CONFIG`.

use bundle_updater::config::UpdaterConfig;
use bundle_updater::constants::CONFIG_ENV_VAR;
use bundle_updater::upgrade::Updater;
use serial_test::serial;
use std::path::Path;
use tempfile::TempDir;

struct EnvGuard;

impl EnvGuard {
    fn set(path: &Path) -> Self {
        // SAFETY: every test touching the variable runs under #[serial].
        unsafe { std::env::set_var(CONFIG_ENV_VAR, path) };
        Self
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: see `EnvGuard::set`.
        unsafe { std::env::remove_var(CONFIG_ENV_VAR) };
    }
}

#[tokio::test]
#[serial]
async fn test_env_var_selects_config_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("custom.toml");
    std::fs::write(
        &path,
        r#"
owner = "acme"
repo = "editor"
app_name = "Editor"
current_version = "v2.0.0"
install_path = "/Applications/Editor.app"
"#,
    )
    .unwrap();
    let _guard = EnvGuard::set(&path);

    assert_eq!(UpdaterConfig::default_path().unwrap(), path);
    let config = UpdaterConfig::load().await.unwrap();
    assert_eq!(config.owner, "acme");
    assert_eq!(config.current_version(), "v2.0.0");
    assert_eq!(config.latest_release_url(), "https://api.github.com/repos/acme/editor/releases/latest");
    assert_eq!(config.state_path().unwrap(), temp.path().join("update-state.json"));
}

#[tokio::test]
#[serial]
async fn test_missing_file_falls_back_to_defaults() {
    let temp = TempDir::new().unwrap();
    let _guard = EnvGuard::set(&temp.path().join("absent.toml"));

    let config = UpdaterConfig::load().await.unwrap();
    assert_eq!(config, UpdaterConfig::default());
}

#[tokio::test]
#[serial]
async fn test_invalid_config_is_refused_by_updater() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bad.toml");
    std::fs::write(&path, "owner = \"acme/evil\"\nrepo = \"editor\"\n").unwrap();
    let _guard = EnvGuard::set(&path);

    let config = UpdaterConfig::load().await.unwrap();
    assert!(config.validate().is_err());
    assert!(Updater::from_config(&config).is_err());
}

#[tokio::test]
#[serial]
async fn test_saved_config_round_trips_through_env() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("config.toml");
    let mut config = UpdaterConfig {
        owner: "acme".to_string(),
        repo: "editor".to_string(),
        ..Default::default()
    };
    config.asset_name = Some("Editor-universal.zip".to_string());
    config.save_to(&path).await.unwrap();
    let _guard = EnvGuard::set(&path);

    assert_eq!(UpdaterConfig::load().await.unwrap(), config);
}
