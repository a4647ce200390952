//! Action Manager
//!
//! Aggregates the actions of every plugin across the dev, user and installed
//! remote sources, dispatches execution to the owning module, and resolves
//! action views.
//!
//! Priority is dev, then user, then remote-installed. When two sources carry
//! the same plugin id, the higher-priority entity owns that id's actions.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use beacon_core::{matches_keyword, split_action_id, Action, PluginEntity, ViewMode};

use crate::services::plugins::module_loader::ModuleLoader;
use crate::services::plugins::remote::RemotePackageSource;
use crate::services::plugins::source::PackageSource;
use crate::utils::error::{AppError, AppResult};

/// View descriptor handed to the view manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionView {
    pub action_id: String,
    /// Absolute file path or URL of the view
    pub view_path: String,
    pub view_mode: ViewMode,
    pub dev_tools_enabled: bool,
}

/// Unified action registry over every plugin source.
#[derive(Debug, Clone)]
pub struct ActionManager {
    dev: Arc<PackageSource>,
    user: Arc<PackageSource>,
    remote: Arc<RemotePackageSource>,
    loader: Arc<ModuleLoader>,
}

impl ActionManager {
    pub fn new(
        dev: Arc<PackageSource>,
        user: Arc<PackageSource>,
        remote: Arc<RemotePackageSource>,
        loader: Arc<ModuleLoader>,
    ) -> Self {
        Self {
            dev,
            user,
            remote,
            loader,
        }
    }

    /// Entities that contribute actions, in priority order.
    ///
    /// Ids already owned by a higher-priority source are skipped, as are
    /// remote entries pointing at a directory the user source already holds.
    pub async fn entities(&self) -> Vec<PluginEntity> {
        let mut ids = HashSet::new();
        let mut roots: HashSet<PathBuf> = HashSet::new();
        let mut entities = Vec::new();

        let candidates = self
            .dev
            .get_all_plugins()
            .await
            .into_iter()
            .chain(self.user.get_all_plugins().await)
            .chain(self.remote.get_installed_plugins().await);

        for entity in candidates {
            if let Some(root) = &entity.root_path {
                if !roots.insert(root.clone()) {
                    continue;
                }
            }
            if !ids.insert(entity.id.clone()) {
                tracing::warn!(
                    plugin = %entity.id,
                    provenance = %entity.provenance,
                    "plugin id is shadowed by a higher-priority source; its actions are hidden"
                );
                continue;
            }
            entities.push(entity);
        }
        entities
    }

    /// Actions of every loadable plugin, filtered by `keyword`.
    ///
    /// Plugins that fail to load are logged and left out. The order is
    /// source priority then name, whatever order the modules finish in.
    pub async fn get_actions(&self, keyword: &str) -> Vec<Action> {
        let entities = self.entities().await;
        let per_plugin = join_all(entities.into_iter().map(|entity| self.collect_actions(entity))).await;

        per_plugin
            .into_iter()
            .flatten()
            .filter(|action| matches_keyword(action, keyword))
            .collect()
    }

    async fn collect_actions(&self, mut entity: PluginEntity) -> Vec<Action> {
        let module = match self.loader.ensure_loaded(&mut entity).await {
            Ok(module) => module,
            Err(e) => {
                tracing::warn!(plugin = %entity.id, "omitting plugin from actions: {}", e);
                return Vec::new();
            }
        };

        match module.list_actions().await {
            Ok(actions) => actions
                .into_iter()
                .map(|a| Action::from_module(&entity.id, a))
                .collect(),
            Err(e) => {
                tracing::warn!(plugin = %entity.id, "failed to list actions: {}", e);
                Vec::new()
            }
        }
    }

    /// Owning entity of a plugin id, honoring source priority.
    pub async fn find_entity(&self, plugin_id: &str) -> Option<PluginEntity> {
        self.entities()
            .await
            .into_iter()
            .find(|entity| entity.id == plugin_id)
    }

    /// Run the handler of a namespaced action and return its result verbatim.
    pub async fn execute_action(&self, action_id: &str, keyword: &str) -> AppResult<Value> {
        let (plugin_id, local_id) = split_action_id(action_id)?;
        let mut entity = self
            .find_entity(plugin_id)
            .await
            .ok_or_else(|| AppError::not_found(format!("plugin '{}'", plugin_id)))?;

        let module = self.loader.ensure_loaded(&mut entity).await?;
        tracing::debug!(plugin = %plugin_id, action = %local_id, "executing action");
        module.run(local_id, keyword).await
    }

    /// Resolve the declared view of an action.
    pub async fn get_action_view(&self, action_id: &str) -> AppResult<ActionView> {
        let (plugin_id, local_id) = split_action_id(action_id)?;
        let mut entity = self
            .find_entity(plugin_id)
            .await
            .ok_or_else(|| AppError::not_found(format!("plugin '{}'", plugin_id)))?;

        let module = self.loader.ensure_loaded(&mut entity).await?;
        let action = module
            .list_actions()
            .await?
            .into_iter()
            .find(|a| a.id == local_id)
            .ok_or_else(|| AppError::not_found(format!("action '{}'", action_id)))?;

        let view = action
            .view
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AppError::not_found(format!("action '{}' declares no view", action_id)))?;

        let root = entity
            .root_path
            .as_deref()
            .ok_or_else(|| AppError::not_found(format!("plugin '{}' is not installed", plugin_id)))?;

        Ok(ActionView {
            action_id: action_id.to_string(),
            view_path: resolve_view_location(root, view)?,
            view_mode: action.view_mode,
            dev_tools_enabled: action.dev_tools,
        })
    }

    /// Force a fresh module for a plugin.
    pub async fn reload_plugin(&self, plugin_id: &str) -> AppResult<PluginEntity> {
        let mut entity = self
            .find_entity(plugin_id)
            .await
            .ok_or_else(|| AppError::not_found(format!("plugin '{}'", plugin_id)))?;
        self.loader.load(&mut entity).await?;
        Ok(entity)
    }
}

/// URLs pass through; anything else is a path inside the plugin root.
fn resolve_view_location(root: &Path, view: &str) -> AppResult<String> {
    if let Ok(url) = url::Url::parse(view) {
        if matches!(url.scheme(), "http" | "https" | "file") {
            return Ok(view.to_string());
        }
    }

    let relative = Path::new(view);
    let contained = !relative.is_absolute()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !contained {
        return Err(AppError::validation(format!(
            "view '{}' must stay inside the plugin directory",
            view
        )));
    }

    let path = root.join(relative);
    if !path.exists() {
        return Err(AppError::not_found(format!("view file {}", path.display())));
    }
    Ok(path.to_string_lossy().to_string())
}
