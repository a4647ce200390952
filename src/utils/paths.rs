//! Cross-Platform Path Utilities
//!
//! Functions for resolving application directories across platforms.
//! Handles `<data_dir>/beacon/`, the per-user plugin root and the
//! development plugin root.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Application directory name under the platform data directory
const APP_DIR_NAME: &str = "beacon";

/// Environment override for the development plugin root
pub const DEV_PLUGINS_ENV: &str = "BEACON_DEV_PLUGINS";

/// Get the platform data directory
pub fn data_dir() -> AppResult<PathBuf> {
    dirs::data_dir().ok_or_else(|| AppError::config("Could not determine data directory"))
}

/// Get the Beacon directory (`<data_dir>/beacon/`)
pub fn beacon_dir() -> AppResult<PathBuf> {
    Ok(data_dir()?.join(APP_DIR_NAME))
}

/// Get the config file path (`<data_dir>/beacon/config.json`)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(beacon_dir()?.join("config.json"))
}

/// Get the per-user plugin root (`<data_dir>/beacon/plugins/`)
pub fn user_plugins_dir() -> AppResult<PathBuf> {
    Ok(beacon_dir()?.join("plugins"))
}

/// Get the default development plugin root (`<data_dir>/beacon/dev-plugins/`)
///
/// `BEACON_DEV_PLUGINS` takes precedence when set.
pub fn default_dev_plugins_dir() -> AppResult<PathBuf> {
    if let Some(dir) = std::env::var_os(DEV_PLUGINS_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    Ok(beacon_dir()?.join("dev-plugins"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Get the Beacon directory, creating if it doesn't exist
pub fn ensure_beacon_dir() -> AppResult<PathBuf> {
    let path = beacon_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}

/// Check that `id` can be used as a single directory name under a plugin root
///
/// Hidden names are rejected because package sources skip them.
pub fn validate_plugin_dir_name(id: &str) -> AppResult<()> {
    let trimmed = id.trim();
    if trimmed.is_empty()
        || trimmed.starts_with('.')
        || trimmed.contains('/')
        || trimmed.contains('\\')
        || trimmed != id
    {
        return Err(AppError::validation(format!(
            "'{}' is not a valid plugin id",
            id
        )));
    }
    Ok(())
}
