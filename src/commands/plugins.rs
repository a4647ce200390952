//! Plugin Commands
//!
//! The channel table of the plugin runtime and the Tauri commands that expose
//! it. The presentation layer reaches every plugin capability through
//! `invoke_channel`; plugin webviews only get `plugin_view_log`.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tauri::{State, Webview};

use beacon_core::Bounds;

use crate::models::response::CommandResponse;
use crate::services::plugins::webview::VIEW_LABEL_PREFIX;
use crate::services::plugins::{PluginRuntime, RequestRouter};
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};

// ============================================================================
// Channel Arguments
// ============================================================================

/// Accepts a missing payload or any object.
#[derive(Debug, Default, Deserialize)]
struct NoArgs {}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct KeywordArgs {
    keyword: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteArgs {
    action_id: String,
    #[serde(default)]
    keyword: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionArgs {
    action_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateViewArgs {
    #[serde(default)]
    view_id: Option<String>,
    url: String,
    #[serde(default)]
    action_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShowViewArgs {
    view_id: String,
    bounds: Bounds,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewArgs {
    view_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PluginArgs {
    plugin_id: String,
}

// ============================================================================
// Channel Table
// ============================================================================

/// Build the router serving every plugin channel over `runtime`.
pub fn build_router(runtime: Arc<PluginRuntime>) -> AppResult<RequestRouter<PluginRuntime>> {
    let mut router = RequestRouter::new(runtime);

    // Actions
    router.route("get-actions", |rt: Arc<PluginRuntime>, args: KeywordArgs| async move {
        Ok::<_, AppError>(rt.actions().get_actions(&args.keyword).await)
    })?;
    router.route("execute-action", |rt: Arc<PluginRuntime>, args: ExecuteArgs| async move {
        rt.actions().execute_action(&args.action_id, &args.keyword).await
    })?;
    router.route("get-action-view", |rt: Arc<PluginRuntime>, args: ActionArgs| async move {
        rt.actions().get_action_view(&args.action_id).await
    })?;

    // Views
    router.route("create-view", |rt: Arc<PluginRuntime>, args: CreateViewArgs| async move {
        rt.views().create_view(args.view_id, &args.url, args.action_id).await
    })?;
    router.route("show-view", |rt: Arc<PluginRuntime>, args: ShowViewArgs| async move {
        rt.views().show_view(&args.view_id, args.bounds).await?;
        Ok::<_, AppError>(true)
    })?;
    router.route("hide-view", |rt: Arc<PluginRuntime>, args: ViewArgs| async move {
        rt.views().hide_view(&args.view_id).await?;
        Ok::<_, AppError>(true)
    })?;
    router.route("destroy-view", |rt: Arc<PluginRuntime>, args: ViewArgs| async move {
        rt.views().destroy_view(&args.view_id).await;
        Ok::<_, AppError>(true)
    })?;
    router.route("toggle-devtools", |rt: Arc<PluginRuntime>, args: ViewArgs| async move {
        rt.views().toggle_devtools(&args.view_id).await
    })?;
    router.route("list-views", |rt: Arc<PluginRuntime>, _args: NoArgs| async move {
        Ok::<_, AppError>(rt.views().list_views().await)
    })?;

    // Sources
    router.route("get-dev-plugins", |rt: Arc<PluginRuntime>, _args: NoArgs| async move {
        Ok::<_, AppError>(rt.dev_source().get_all_plugins().await)
    })?;
    router.route("get-user-plugins", |rt: Arc<PluginRuntime>, _args: NoArgs| async move {
        Ok::<_, AppError>(rt.user_source().get_all_plugins().await)
    })?;
    router.route("get-remote-plugins", |rt: Arc<PluginRuntime>, _args: NoArgs| async move {
        Ok::<_, AppError>(rt.remote_source().get_plugins().await)
    })?;
    router.route("refresh-remote-plugins", |rt: Arc<PluginRuntime>, _args: NoArgs| async move {
        rt.remote_source().refresh().await;
        Ok::<_, AppError>(rt.remote_source().get_plugins().await)
    })?;
    router.route("reload-plugin", |rt: Arc<PluginRuntime>, args: PluginArgs| async move {
        rt.actions().reload_plugin(&args.plugin_id).await
    })?;

    // Market
    router.route("download-plugin", |rt: Arc<PluginRuntime>, args: PluginArgs| async move {
        rt.market().download_and_install_plugin(&args.plugin_id).await?;
        Ok::<_, AppError>(true)
    })?;
    router.route("uninstall-plugin", |rt: Arc<PluginRuntime>, args: PluginArgs| async move {
        rt.market().uninstall_plugin(&args.plugin_id).await?;
        Ok::<_, AppError>(true)
    })?;
    router.route("get-plugin-root-directory", |rt: Arc<PluginRuntime>, _args: NoArgs| async move {
        Ok::<_, AppError>(rt.plugin_root_directory().to_string_lossy().into_owned())
    })?;

    tracing::debug!("plugin router ready with {} channels", router.channels().len());
    Ok(router)
}

// ============================================================================
// Tauri Commands
// ============================================================================

/// Invoke a plugin runtime channel.
///
/// Plugin webviews are refused; the host UI is the only caller.
#[tauri::command]
pub async fn invoke_channel(
    webview: Webview,
    state: State<'_, AppState>,
    channel: String,
    payload: Option<Value>,
) -> Result<CommandResponse<Value>, String> {
    if is_plugin_view(webview.label()) {
        tracing::warn!(view = %webview.label(), channel = %channel, "plugin view tried to invoke a channel");
        return Ok(CommandResponse::err(format!(
            "channel '{}' is not available to plugin views",
            channel
        )));
    }
    Ok(state
        .dispatch(&channel, payload.unwrap_or(Value::Null))
        .await)
}

/// Log a message on behalf of a plugin webview.
#[tauri::command]
pub fn plugin_view_log(webview: Webview, level: String, message: String) {
    let view = webview.label().to_string();
    match level.to_ascii_lowercase().as_str() {
        "error" => tracing::error!(view = %view, "{}", message),
        "warn" | "warning" => tracing::warn!(view = %view, "{}", message),
        "debug" => tracing::debug!(view = %view, "{}", message),
        "trace" => tracing::trace!(view = %view, "{}", message),
        _ => tracing::info!(view = %view, "{}", message),
    }
}

fn is_plugin_view(label: &str) -> bool {
    label.starts_with(VIEW_LABEL_PREFIX)
}
