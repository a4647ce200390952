//! Market Manager
//!
//! Installs registry packages into the per-user plugin root and removes them.
//!
//! Install is all-or-nothing:
//! 1. Resolve the id against the current registry listings
//! 2. Download the tarball
//! 3. Extract into a hidden staging directory inside the user root
//! 4. Move any existing installation aside, rename the staging directory
//!    into `<user_root>/<id>`
//! 5. Verify the user source now reports the plugin; otherwise restore the
//!    previous state
//!
//! Progress is reported through an optional observer; the desktop shell
//! forwards it as `plugin:install-progress` events.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use beacon_core::{validate_plugin_dir, PluginEntity};

use crate::services::plugins::extract::extract_tarball;
use crate::services::plugins::module_loader::ModuleLoader;
use crate::services::plugins::remote::RemotePackageSource;
use crate::services::plugins::source::PackageSource;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{ensure_dir, validate_plugin_dir_name};

/// Install phase reported to the observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallPhase {
    Resolving,
    Downloading,
    Extracting,
    Verifying,
    Complete,
}

/// Install progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallProgress {
    pub plugin_id: String,
    pub phase: InstallPhase,
    pub message: String,
    /// 0.0 to 1.0
    pub progress: f64,
}

/// Receives install progress.
pub type ProgressObserver = Arc<dyn Fn(InstallProgress) + Send + Sync>;

/// Install/uninstall orchestration against the user root.
pub struct MarketManager {
    remote: Arc<RemotePackageSource>,
    user: Arc<PackageSource>,
    loader: Arc<ModuleLoader>,
    observer: Option<ProgressObserver>,
}

impl MarketManager {
    pub fn new(
        remote: Arc<RemotePackageSource>,
        user: Arc<PackageSource>,
        loader: Arc<ModuleLoader>,
    ) -> Self {
        Self {
            remote,
            user,
            loader,
            observer: None,
        }
    }

    /// Report install progress to `observer`.
    pub fn with_progress(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Directory plugins are installed into.
    pub fn user_root(&self) -> &Path {
        self.user.root()
    }

    /// Download a listed plugin and install it under the user root.
    pub async fn download_and_install_plugin(&self, plugin_id: &str) -> AppResult<PluginEntity> {
        validate_plugin_dir_name(plugin_id)?;

        self.emit(plugin_id, InstallPhase::Resolving, "Resolving package...", 0.1);
        let listing = self.remote.find_listing(plugin_id).await.ok_or_else(|| {
            AppError::install(format!("plugin '{}' is not listed on the registry", plugin_id))
        })?;

        self.emit(
            plugin_id,
            InstallPhase::Downloading,
            &format!("Downloading {}@{}...", listing.name, listing.version),
            0.3,
        );
        let artifact = self.remote.fetch_artifact(&listing).await.map_err(|e| {
            AppError::install(format!("failed to download '{}': {}", plugin_id, e))
        })?;

        self.emit(plugin_id, InstallPhase::Extracting, "Extracting package...", 0.6);
        let user_root = self.user.root().to_path_buf();
        ensure_dir(&user_root)?;
        let staging = tempfile::Builder::new()
            .prefix(".install-")
            .tempdir_in(&user_root)?;

        let staging_path = staging.path().to_path_buf();
        tokio::task::spawn_blocking(move || extract_tarball(&artifact, &staging_path))
            .await
            .map_err(|e| AppError::internal(format!("extraction task failed: {}", e)))??;

        let (manifest, validation) = validate_plugin_dir(staging.path());
        if !validation.is_valid {
            return Err(AppError::install(format!(
                "package '{}' is not a valid plugin: {}",
                plugin_id,
                validation.errors.join("; ")
            )));
        }
        if let Some(manifest) = manifest {
            if manifest.id() != plugin_id {
                return Err(AppError::install(format!(
                    "package declares id '{}' but '{}' was requested",
                    manifest.id(),
                    plugin_id
                )));
            }
        }

        self.emit(plugin_id, InstallPhase::Verifying, "Verifying installation...", 0.8);
        let target = user_root.join(plugin_id);
        self.loader.invalidate_under(&target).await;
        let backup = self.commit(staging.path(), &target, plugin_id)?;

        if !self.user.has(plugin_id).await {
            let reason = self
                .user
                .list_candidates()
                .into_iter()
                .find(|c| c.root_path.as_deref() == Some(target.as_path()))
                .map(|c| c.validation.errors.join("; "))
                .unwrap_or_else(|| "plugin not found after install".to_string());
            rollback(&target, backup.as_deref());
            return Err(AppError::install(format!(
                "'{}' failed verification: {}",
                plugin_id, reason
            )));
        }

        if let Some(backup) = backup {
            if let Err(e) = std::fs::remove_dir_all(&backup) {
                tracing::warn!("failed to remove previous install {}: {}", backup.display(), e);
            }
        }

        let entity = self
            .user
            .find(plugin_id)
            .await
            .ok_or_else(|| AppError::install(format!("'{}' vanished after install", plugin_id)))?;

        self.emit(
            plugin_id,
            InstallPhase::Complete,
            &format!("Plugin '{}' installed successfully", plugin_id),
            1.0,
        );
        tracing::info!(plugin = %plugin_id, version = %entity.version, "plugin installed");
        Ok(entity)
    }

    /// Move the staged tree into place, returning the backup of any
    /// previous installation.
    fn commit(&self, staged: &Path, target: &Path, plugin_id: &str) -> AppResult<Option<PathBuf>> {
        let backup = if target.exists() {
            let backup = target.with_file_name(format!(".{}.previous-{}", plugin_id, uuid::Uuid::new_v4()));
            std::fs::rename(target, &backup).map_err(|e| {
                AppError::install(format!("failed to move existing '{}' aside: {}", plugin_id, e))
            })?;
            Some(backup)
        } else {
            None
        };

        if let Err(e) = std::fs::rename(staged, target) {
            rollback(target, backup.as_deref());
            return Err(AppError::install(format!(
                "failed to move '{}' into place: {}",
                plugin_id, e
            )));
        }
        Ok(backup)
    }

    /// Remove an installed plugin and stop its module.
    pub async fn uninstall_plugin(&self, plugin_id: &str) -> AppResult<()> {
        validate_plugin_dir_name(plugin_id)?;

        let target = self.installed_dir(plugin_id).await.ok_or_else(|| {
            AppError::uninstall(format!("plugin '{}' is not installed", plugin_id))
        })?;

        self.loader.invalidate_under(&target).await;

        tokio::fs::remove_dir_all(&target).await.map_err(|e| {
            AppError::uninstall(format!("failed to remove '{}': {}", plugin_id, e))
        })?;

        if target.exists() || self.user.has(plugin_id).await {
            return Err(AppError::uninstall(format!(
                "plugin '{}' is still present after removal",
                plugin_id
            )));
        }

        tracing::info!(plugin = %plugin_id, "plugin uninstalled");
        Ok(())
    }

    /// Directory of an installed plugin. The manifest id wins over the
    /// directory name; a same-named directory covers plugins whose manifest
    /// no longer parses.
    async fn installed_dir(&self, plugin_id: &str) -> Option<PathBuf> {
        let root = self.user.root();
        let by_id = self
            .user
            .find(plugin_id)
            .await
            .and_then(|entity| entity.root_path)
            .filter(|dir| dir.starts_with(root) && dir.as_path() != root);
        if by_id.is_some() {
            return by_id;
        }
        let by_name = root.join(plugin_id);
        by_name.is_dir().then_some(by_name)
    }

    fn emit(&self, plugin_id: &str, phase: InstallPhase, message: &str, progress: f64) {
        tracing::debug!(plugin = %plugin_id, ?phase, "{}", message);
        if let Some(observer) = &self.observer {
            observer(InstallProgress {
                plugin_id: plugin_id.to_string(),
                phase,
                message: message.to_string(),
                progress,
            });
        }
    }
}

/// Remove a half-installed tree and put the previous one back.
fn rollback(target: &Path, backup: Option<&Path>) {
    if target.exists() {
        if let Err(e) = std::fs::remove_dir_all(target) {
            tracing::error!("rollback could not remove {}: {}", target.display(), e);
        }
    }
    if let Some(backup) = backup {
        if let Err(e) = std::fs::rename(backup, target) {
            tracing::error!(
                "rollback could not restore {} from {}: {}",
                target.display(),
                backup.display(),
                e
            );
        }
    }
}

impl std::fmt::Debug for MarketManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketManager")
            .field("user_root", &self.user.root())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::plugins::remote::{RegistryClient, RegistryListing, DEFAULT_REGISTRY_TTL};
    use async_trait::async_trait;
    use beacon_core::Provenance;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::sync::Mutex;

    const SCRIPT: &str = "while IFS= read -r line; do printf '%s\\n' '{\"result\":[{\"id\":\"ping\",\"title\":\"Ping\"}]}'; done\n";

    fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn plugin_tarball(name: &str, version: &str) -> Vec<u8> {
        let manifest = format!(
            r#"{{"name":"{}","version":"{}","main":"main.sh","keywords":["beacon-plugin"]}}"#,
            name, version
        );
        tarball(&[("package/package.json", &manifest), ("package/main.sh", SCRIPT)])
    }

    struct TarballRegistry {
        listings: Vec<RegistryListing>,
        artifact: Mutex<Vec<u8>>,
    }

    #[async_trait]
    impl RegistryClient for TarballRegistry {
        fn registry_url(&self) -> &str {
            "https://registry.test"
        }

        async fn search(&self, _keyword: &str) -> AppResult<Vec<RegistryListing>> {
            Ok(self.listings.clone())
        }

        async fn fetch_artifact(&self, _listing: &RegistryListing) -> AppResult<Vec<u8>> {
            Ok(self.artifact.lock().unwrap().clone())
        }
    }

    struct Fixture {
        _tmp: tempfile::TempDir,
        user_root: PathBuf,
        registry: Arc<TarballRegistry>,
        user: Arc<PackageSource>,
        loader: Arc<ModuleLoader>,
        market: MarketManager,
        events: Arc<Mutex<Vec<InstallPhase>>>,
    }

    fn fixture(artifact: Vec<u8>) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let user_root = tmp.path().join("plugins");
        let registry = Arc::new(TarballRegistry {
            listings: vec![RegistryListing {
                name: "echo".to_string(),
                version: "1.0.0".to_string(),
                description: "Echo".to_string(),
                keywords: vec!["beacon-plugin".to_string()],
                author: None,
                artifact_url: None,
            }],
            artifact: Mutex::new(artifact),
        });
        let loader = Arc::new(ModuleLoader::default());
        let user = Arc::new(PackageSource::new(&user_root, Provenance::User, loader.clone()));
        let remote = Arc::new(RemotePackageSource::new(
            registry.clone(),
            "beacon-plugin",
            &["beacon-plugin".to_string()],
            DEFAULT_REGISTRY_TTL,
            &user_root,
            loader.clone(),
        ));

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let market = MarketManager::new(remote, user.clone(), loader.clone())
            .with_progress(Arc::new(move |p: InstallProgress| sink.lock().unwrap().push(p.phase)));

        Fixture {
            _tmp: tmp,
            user_root,
            registry,
            user,
            loader,
            market,
            events,
        }
    }

    fn visible_entries(root: &Path) -> Vec<String> {
        std::fs::read_dir(root)
            .map(|entries| {
                entries
                    .flatten()
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_install_then_uninstall() {
        let f = fixture(plugin_tarball("echo", "1.0.0"));

        let entity = f.market.download_and_install_plugin("echo").await.unwrap();
        assert_eq!(entity.provenance, Provenance::User);
        assert_eq!(f.user.find("echo").await.unwrap().version, "1.0.0");
        assert_eq!(visible_entries(&f.user_root), vec!["echo"]);
        assert_eq!(
            *f.events.lock().unwrap(),
            vec![
                InstallPhase::Resolving,
                InstallPhase::Downloading,
                InstallPhase::Extracting,
                InstallPhase::Verifying,
                InstallPhase::Complete,
            ]
        );

        f.market.uninstall_plugin("echo").await.unwrap();
        assert!(f.user.find("echo").await.is_none());
        assert!(!f.user.has("echo").await);
        assert!(matches!(
            f.market.uninstall_plugin("echo").await,
            Err(AppError::Uninstall(_))
        ));
    }

    #[tokio::test]
    async fn test_unlisted_plugin_fails() {
        let f = fixture(plugin_tarball("echo", "1.0.0"));
        let err = f.market.download_and_install_plugin("ghost").await.unwrap_err();
        assert!(matches!(err, AppError::Install(_)));
        assert!(visible_entries(&f.user_root).is_empty());
    }

    #[tokio::test]
    async fn test_invalid_package_leaves_nothing_behind() {
        let f = fixture(tarball(&[(
            "package/package.json",
            r#"{"name":"echo","version":"1.0.0","main":"missing.sh"}"#,
        )]));

        let err = f.market.download_and_install_plugin("echo").await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert!(visible_entries(&f.user_root).is_empty());
    }

    #[tokio::test]
    async fn test_mismatched_package_name_is_rejected() {
        let f = fixture(plugin_tarball("impostor", "1.0.0"));
        assert!(f.market.download_and_install_plugin("echo").await.is_err());
        assert!(visible_entries(&f.user_root).is_empty());
    }

    #[tokio::test]
    async fn test_failed_reinstall_keeps_previous_version() {
        let f = fixture(plugin_tarball("echo", "1.0.0"));
        f.market.download_and_install_plugin("echo").await.unwrap();

        *f.registry.artifact.lock().unwrap() = b"corrupt".to_vec();
        assert!(f.market.download_and_install_plugin("echo").await.is_err());
        assert_eq!(f.user.find("echo").await.unwrap().version, "1.0.0");

        *f.registry.artifact.lock().unwrap() = plugin_tarball("echo", "2.0.0");
        f.market.download_and_install_plugin("echo").await.unwrap();
        assert_eq!(f.user.find("echo").await.unwrap().version, "2.0.0");
        assert_eq!(visible_entries(&f.user_root), vec!["echo"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_uninstall_stops_running_module() {
        let f = fixture(plugin_tarball("echo", "1.0.0"));
        let mut entity = f.market.download_and_install_plugin("echo").await.unwrap();
        let module = f.loader.load(&mut entity).await.unwrap();
        assert!(module.is_alive());

        f.market.uninstall_plugin("echo").await.unwrap();
        assert!(!module.is_alive());
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let f = fixture(plugin_tarball("echo", "1.0.0"));
        assert!(f.market.download_and_install_plugin("../echo").await.is_err());
        assert!(f.market.uninstall_plugin("..").await.is_err());
    }

    #[tokio::test]
    async fn test_uninstall_resolves_directory_by_manifest_id() {
        let f = fixture(plugin_tarball("echo", "1.0.0"));
        let dir = f.user_root.join("echo-checkout");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("package.json"),
            r#"{"name":"echo","version":"0.9.0","main":"main.sh","keywords":["beacon-plugin"]}"#,
        )
        .unwrap();
        std::fs::write(dir.join("main.sh"), SCRIPT).unwrap();
        assert!(f.user.has("echo").await);

        f.market.uninstall_plugin("echo").await.unwrap();
        assert!(!dir.exists());
        assert!(!f.user.has("echo").await);
        assert!(visible_entries(&f.user_root).is_empty());
    }
}
