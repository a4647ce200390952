//! Application State
//!
//! Global state managed by Tauri, containing all services.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use beacon_core::SurfaceFactory;

use crate::commands::plugins::build_router;
use crate::models::response::CommandResponse;
use crate::models::settings::{AppConfig, SettingsUpdate};
use crate::services::plugins::{PluginRuntime, ProgressObserver, RequestRouter, RuntimeConfig};
use crate::storage::ConfigService;
use crate::utils::error::{AppError, AppResult};

/// Application state managed by Tauri
pub struct AppState {
    /// Configuration service for app settings
    config: Arc<RwLock<Option<ConfigService>>>,
    /// Plugin runtime shared with every channel handler
    runtime: Arc<RwLock<Option<Arc<PluginRuntime>>>>,
    /// Channel router over the plugin runtime
    router: Arc<RwLock<Option<RequestRouter<PluginRuntime>>>>,
    /// Whether the state has been initialized
    initialized: Arc<RwLock<bool>>,
}

impl AppState {
    /// Create a new uninitialized app state
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(None)),
            runtime: Arc::new(RwLock::new(None)),
            router: Arc::new(RwLock::new(None)),
            initialized: Arc::new(RwLock::new(false)),
        }
    }

    /// Initialize all services
    pub async fn initialize(
        &self,
        surfaces: Arc<dyn SurfaceFactory>,
        progress: Option<ProgressObserver>,
    ) -> AppResult<()> {
        if *self.initialized.read().await {
            return Ok(());
        }

        // Initialize config
        let config_service = ConfigService::new()?;
        let runtime_config = RuntimeConfig::from_app_config(config_service.get_config())?;
        {
            let mut config_lock = self.config.write().await;
            *config_lock = Some(config_service);
        }

        let runtime = PluginRuntime::with_npm(runtime_config, surfaces, progress)?;
        self.attach_runtime(Arc::new(runtime)).await
    }

    /// Install a runtime and its router, then start background work
    pub async fn attach_runtime(&self, runtime: Arc<PluginRuntime>) -> AppResult<()> {
        let mut initialized = self.initialized.write().await;
        if *initialized {
            return Ok(());
        }

        let router = build_router(Arc::clone(&runtime))?;
        runtime.start_background().await?;

        *self.router.write().await = Some(router);
        *self.runtime.write().await = Some(runtime);
        *initialized = true;
        tracing::info!("beacon state initialized");
        Ok(())
    }

    /// Get the current configuration
    pub async fn get_config(&self) -> AppResult<AppConfig> {
        let guard = self.config.read().await;
        match &*guard {
            Some(config) => Ok(config.get_config_clone()),
            None => Err(AppError::config("Config service not initialized")),
        }
    }

    /// Update the configuration. Runtime settings apply on next start.
    pub async fn update_config(&self, update: SettingsUpdate) -> AppResult<AppConfig> {
        let mut guard = self.config.write().await;
        match &mut *guard {
            Some(config) => config.update_config(update),
            None => Err(AppError::config("Config service not initialized")),
        }
    }

    /// Dispatch a channel call to the plugin router
    pub async fn dispatch(&self, channel: &str, payload: Value) -> CommandResponse<Value> {
        let guard = self.router.read().await;
        match &*guard {
            Some(router) => router.dispatch(channel, payload).await,
            None => CommandResponse::err("Plugin runtime not initialized"),
        }
    }

    /// Get the plugin runtime
    pub async fn runtime(&self) -> AppResult<Arc<PluginRuntime>> {
        let guard = self.runtime.read().await;
        match &*guard {
            Some(runtime) => Ok(Arc::clone(runtime)),
            None => Err(AppError::internal("Plugin runtime not initialized")),
        }
    }

    /// Destroy every plugin view; runs when the host window closes
    pub async fn destroy_all_views(&self) -> usize {
        match self.runtime().await {
            Ok(runtime) => runtime.views().destroy_all_views().await,
            Err(_) => 0,
        }
    }

    /// Stop the plugin runtime
    pub async fn shutdown(&self) {
        self.router.write().await.take();
        let runtime = self.runtime.write().await.take();
        if let Some(runtime) = runtime {
            runtime.shutdown().await;
        }
        *self.initialized.write().await = false;
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("initialized", &self.initialized)
            .finish()
    }
}
