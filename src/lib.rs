//! Beacon Desktop - Rust Backend Library
//!
//! This library provides the backend of the Beacon Desktop plugin host.
//! It includes:
//! - Tauri command handlers for frontend IPC
//! - The plugin runtime (sources, module loader, marketplace, views, router)
//! - Storage layer (JSON config)
//! - Data models and utilities

pub mod commands;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

// Re-export commonly used items from commands
pub use commands::{
    // Plugin channel entry point
    invoke_channel, plugin_view_log,
    // Settings commands
    get_settings, update_settings,
};
// Re-export models (avoiding settings module conflict)
pub use models::response::*;
pub use models::settings::{AppConfig, SettingsUpdate};
pub use state::AppState;
pub use utils::error::{AppError, AppResult};
