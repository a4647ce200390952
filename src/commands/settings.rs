//! Settings Commands
//!
//! Read and update `config.json`. Plugin roots, registry and timeout
//! changes take effect the next time the runtime starts.

use tauri::State;

use crate::models::response::CommandResponse;
use crate::models::settings::{AppConfig, SettingsUpdate};
use crate::state::AppState;

/// Get current application settings
#[tauri::command]
pub async fn get_settings(
    state: State<'_, AppState>,
) -> Result<CommandResponse<AppConfig>, String> {
    Ok(state.get_config().await.into())
}

/// Update application settings with a partial update
#[tauri::command]
pub async fn update_settings(
    state: State<'_, AppState>,
    update: SettingsUpdate,
) -> Result<CommandResponse<AppConfig>, String> {
    let result = state.update_config(update).await;
    if let Err(ref e) = result {
        tracing::warn!("settings update rejected: {}", e);
    }
    Ok(result.into())
}
