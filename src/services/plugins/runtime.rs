//! Plugin Runtime
//!
//! Explicit context object that owns the package sources, the module cache
//! and the managers built on them. One runtime is created at startup and
//! shared with every request handler.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use beacon_core::{Provenance, SurfaceFactory};

use crate::models::settings::AppConfig;
use crate::services::plugins::actions::ActionManager;
use crate::services::plugins::market::{MarketManager, ProgressObserver};
use crate::services::plugins::module_loader::ModuleLoader;
use crate::services::plugins::remote::{NpmRegistryClient, RegistryClient, RemotePackageSource};
use crate::services::plugins::source::PackageSource;
use crate::services::plugins::views::ViewManager;
use crate::services::plugins::watcher::DevPluginWatcher;
use crate::utils::error::AppResult;
use crate::utils::paths::{default_dev_plugins_dir, ensure_dir, user_plugins_dir};

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub dev_root: PathBuf,
    pub user_root: PathBuf,
    pub registry_url: String,
    pub search_keyword: String,
    pub allowed_keywords: Vec<String>,
    pub registry_ttl: Duration,
    pub module_timeout: Duration,
    pub watch_dev_plugins: bool,
    pub devtools_enabled: bool,
}

impl RuntimeConfig {
    /// Resolve directories and durations from the stored configuration.
    pub fn from_app_config(config: &AppConfig) -> AppResult<Self> {
        let dev_root = match config.dev_plugins_dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => default_dev_plugins_dir()?,
        };

        Ok(Self {
            dev_root,
            user_root: user_plugins_dir()?,
            registry_url: config.registry_url.clone(),
            search_keyword: config.search_keyword.clone(),
            allowed_keywords: config.allowed_keywords.clone(),
            registry_ttl: Duration::from_secs(config.registry_ttl_secs),
            module_timeout: Duration::from_secs(config.module_timeout_secs),
            watch_dev_plugins: config.watch_dev_plugins,
            devtools_enabled: cfg!(debug_assertions) || config.debug_mode,
        })
    }

    /// Defaults over explicit roots, without watching or devtools.
    pub fn for_roots(dev_root: impl Into<PathBuf>, user_root: impl Into<PathBuf>) -> Self {
        let defaults = AppConfig::default();
        Self {
            dev_root: dev_root.into(),
            user_root: user_root.into(),
            registry_url: defaults.registry_url,
            search_keyword: defaults.search_keyword,
            allowed_keywords: defaults.allowed_keywords,
            registry_ttl: Duration::from_secs(defaults.registry_ttl_secs),
            module_timeout: Duration::from_secs(defaults.module_timeout_secs),
            watch_dev_plugins: false,
            devtools_enabled: false,
        }
    }
}

/// Shared plugin runtime context.
pub struct PluginRuntime {
    config: RuntimeConfig,
    loader: Arc<ModuleLoader>,
    dev: Arc<PackageSource>,
    user: Arc<PackageSource>,
    remote: Arc<RemotePackageSource>,
    actions: ActionManager,
    market: MarketManager,
    views: ViewManager,
    cancel: CancellationToken,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
    watcher: Mutex<Option<DevPluginWatcher>>,
}

impl PluginRuntime {
    pub fn new(
        config: RuntimeConfig,
        registry: Arc<dyn RegistryClient>,
        surfaces: Arc<dyn SurfaceFactory>,
        progress: Option<ProgressObserver>,
    ) -> Self {
        let loader = Arc::new(ModuleLoader::new(config.module_timeout));
        let dev = Arc::new(PackageSource::new(
            config.dev_root.clone(),
            Provenance::Dev,
            Arc::clone(&loader),
        ));
        let user = Arc::new(PackageSource::new(
            config.user_root.clone(),
            Provenance::User,
            Arc::clone(&loader),
        ));
        let remote = Arc::new(RemotePackageSource::new(
            registry,
            config.search_keyword.clone(),
            &config.allowed_keywords,
            config.registry_ttl,
            config.user_root.clone(),
            Arc::clone(&loader),
        ));

        let actions = ActionManager::new(
            Arc::clone(&dev),
            Arc::clone(&user),
            Arc::clone(&remote),
            Arc::clone(&loader),
        );
        let mut market = MarketManager::new(Arc::clone(&remote), Arc::clone(&user), Arc::clone(&loader));
        if let Some(observer) = progress {
            market = market.with_progress(observer);
        }
        let views = ViewManager::new(surfaces, config.devtools_enabled);

        Self {
            config,
            loader,
            dev,
            user,
            remote,
            actions,
            market,
            views,
            cancel: CancellationToken::new(),
            refresh_task: Mutex::new(None),
            watcher: Mutex::new(None),
        }
    }

    /// Runtime backed by the npm-compatible registry in `config`.
    pub fn with_npm(
        config: RuntimeConfig,
        surfaces: Arc<dyn SurfaceFactory>,
        progress: Option<ProgressObserver>,
    ) -> AppResult<Self> {
        let registry = Arc::new(NpmRegistryClient::new(config.registry_url.clone())?);
        Ok(Self::new(config, registry, surfaces, progress))
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn loader(&self) -> &Arc<ModuleLoader> {
        &self.loader
    }

    pub fn dev_source(&self) -> &Arc<PackageSource> {
        &self.dev
    }

    pub fn user_source(&self) -> &Arc<PackageSource> {
        &self.user
    }

    pub fn remote_source(&self) -> &Arc<RemotePackageSource> {
        &self.remote
    }

    pub fn actions(&self) -> &ActionManager {
        &self.actions
    }

    pub fn market(&self) -> &MarketManager {
        &self.market
    }

    pub fn views(&self) -> &ViewManager {
        &self.views
    }

    /// Directory plugins are installed into.
    pub fn plugin_root_directory(&self) -> &Path {
        self.user.root()
    }

    /// Start the registry refresh timer and, when enabled, the dev watcher.
    pub async fn start_background(self: &Arc<Self>) -> AppResult<()> {
        ensure_dir(&self.config.user_root)?;

        {
            let mut task = self.refresh_task.lock().await;
            if task.is_none() {
                *task = Some(self.remote.spawn_refresh_timer(self.cancel.child_token()));
            }
        }

        if self.config.watch_dev_plugins {
            let mut watcher = self.watcher.lock().await;
            if watcher.is_none() {
                if self.config.dev_root.is_dir() {
                    match DevPluginWatcher::start(&self.config.dev_root, Arc::clone(&self.loader)) {
                        Ok(started) => *watcher = Some(started),
                        Err(e) => tracing::warn!("dev plugin watcher not started: {}", e),
                    }
                } else {
                    tracing::debug!(
                        root = %self.config.dev_root.display(),
                        "dev plugin root missing; not watching"
                    );
                }
            }
        }

        Ok(())
    }

    /// Stop background work, destroy views and stop every module.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(task) = self.refresh_task.lock().await.take() {
            let _ = task.await;
        }
        self.watcher.lock().await.take();
        self.views.destroy_all_views().await;
        self.loader.shutdown_all().await;
        tracing::info!("plugin runtime stopped");
    }
}

impl std::fmt::Debug for PluginRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRuntime")
            .field("dev_root", &self.config.dev_root)
            .field("user_root", &self.config.user_root)
            .finish()
    }
}
