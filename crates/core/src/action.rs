//! Actions
//!
//! An action is one invocable capability exposed by a loaded plugin module.
//! Modules describe their actions with plugin-local ids; the host namespaces
//! every id as `<pluginId>:<localId>` so independently authored plugins can
//! reuse the same local id without colliding.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Separator between the plugin id and the local action id.
pub const ACTION_SEPARATOR: char = ':';

/// How an action's view is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    /// Rendered inside the host window
    #[default]
    Embedded,
    /// Rendered on a surface of its own
    OwnSurface,
}

/// Action as described by the plugin module itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleAction {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
    /// View path relative to the plugin root, or an absolute URL
    #[serde(default)]
    pub view: Option<String>,
    #[serde(default)]
    pub view_mode: ViewMode,
    #[serde(default)]
    pub dev_tools: bool,
}

/// Action as exposed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Namespaced id `<pluginId>:<localId>`
    pub id: String,
    /// Owning plugin
    pub plugin_id: String,
    pub title: String,
    pub description: String,
    pub icon: Option<String>,
    pub view_path: Option<String>,
    pub view_mode: ViewMode,
    pub dev_tools_enabled: bool,
}

impl Action {
    /// Namespace and tag a module action with its owning plugin.
    pub fn from_module(plugin_id: &str, action: ModuleAction) -> Self {
        Self {
            id: namespace_action_id(plugin_id, &action.id),
            plugin_id: plugin_id.to_string(),
            title: action.title,
            description: action.description,
            icon: action.icon,
            view_path: action.view,
            view_mode: action.view_mode,
            dev_tools_enabled: action.dev_tools,
        }
    }

    /// The plugin-local part of the id.
    pub fn local_id(&self) -> &str {
        split_action_id(&self.id)
            .map(|(_, local)| local)
            .unwrap_or(&self.id)
    }
}

/// Join a plugin id and a local action id.
pub fn namespace_action_id(plugin_id: &str, local_id: &str) -> String {
    format!("{}{}{}", plugin_id, ACTION_SEPARATOR, local_id)
}

/// Split a namespaced action id into `(plugin_id, local_id)`.
///
/// Plugin ids never contain the separator, so the first occurrence is the
/// boundary; local ids may contain it.
pub fn split_action_id(action_id: &str) -> CoreResult<(&str, &str)> {
    match action_id.split_once(ACTION_SEPARATOR) {
        Some((plugin, local)) if !plugin.is_empty() && !local.is_empty() => Ok((plugin, local)),
        _ => Err(CoreError::parse(format!(
            "Action id '{}' is not of the form <pluginId>{}<actionId>",
            action_id, ACTION_SEPARATOR
        ))),
    }
}

/// Case-insensitive substring match on title or description.
/// An empty (or blank) keyword matches everything.
pub fn matches_keyword(action: &Action, keyword: &str) -> bool {
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() {
        return true;
    }
    action.title.to_lowercase().contains(&keyword)
        || action.description.to_lowercase().contains(&keyword)
}
