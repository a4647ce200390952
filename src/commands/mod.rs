//! Tauri Commands
//!
//! Contains all Tauri command handlers that can be called from the frontend.
//! These are the IPC entry points for the application.

pub mod plugins;
pub mod settings;

pub use plugins::{build_router, invoke_channel, plugin_view_log};
pub use settings::{get_settings, update_settings};
