// Beacon Desktop - Tauri Application Entry Point
// Prevents additional console window on Windows in release
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::sync::Arc;

use beacon_desktop::services::plugins::{InstallProgress, ProgressObserver, TauriSurfaceFactory};
use beacon_desktop::state::AppState;
use beacon_desktop::storage::ConfigService;

use tauri::{Emitter, Manager, RunEvent, WindowEvent};
use tracing_subscriber::EnvFilter;

/// Event carrying install progress to the frontend
const INSTALL_PROGRESS_EVENT: &str = "plugin:install-progress";

/// Label of the window hosting plugin views
const MAIN_WINDOW: &str = "main";

fn init_logging() {
    let configured = ConfigService::new()
        .map(|service| service.get_config().log_level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured)),
        )
        .init();
}

fn main() {
    init_logging();

    let app = tauri::Builder::default()
        .manage(AppState::new())
        .invoke_handler(tauri::generate_handler![
            // Plugin channel entry point
            beacon_desktop::commands::plugins::invoke_channel,
            beacon_desktop::commands::plugins::plugin_view_log,
            // Settings commands
            beacon_desktop::commands::settings::get_settings,
            beacon_desktop::commands::settings::update_settings,
        ])
        .setup(|app| {
            let window = app
                .get_window(MAIN_WINDOW)
                .ok_or("main window is missing")?;
            let surfaces = Arc::new(TauriSurfaceFactory::new(window));

            let handle = app.handle().clone();
            let observer: ProgressObserver = Arc::new(move |progress: InstallProgress| {
                if let Err(e) = handle.emit(INSTALL_PROGRESS_EVENT, &progress) {
                    tracing::warn!("failed to emit install progress: {}", e);
                }
            });

            let state = app.state::<AppState>();
            tauri::async_runtime::block_on(state.initialize(surfaces, Some(observer)))?;

            #[cfg(debug_assertions)]
            {
                if let Some(window) = app.get_webview_window(MAIN_WINDOW) {
                    window.open_devtools();
                }
            }
            Ok(())
        })
        .on_window_event(|window, event| {
            if window.label() == MAIN_WINDOW && matches!(event, WindowEvent::Destroyed) {
                let handle = window.app_handle().clone();
                tauri::async_runtime::spawn(async move {
                    let state = handle.state::<AppState>();
                    state.destroy_all_views().await;
                });
            }
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app_handle, event| {
        if let RunEvent::Exit = event {
            let state = app_handle.state::<AppState>();
            tauri::async_runtime::block_on(state.shutdown());
        }
    });
}
