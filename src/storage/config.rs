//! JSON Configuration Management
//!
//! Handles reading and writing the application configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::settings::{registry_url_override, AppConfig, SettingsUpdate};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{config_path, ensure_beacon_dir, ensure_dir};

/// Configuration service for managing app settings
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    /// Configuration as persisted in the file
    stored: AppConfig,
    registry_override: Option<String>,
    /// Stored configuration with overrides applied
    config: AppConfig,
}

impl ConfigService {
    /// Create a new config service, loading existing config or creating defaults
    pub fn new() -> AppResult<Self> {
        // Ensure the config directory exists
        ensure_beacon_dir()?;
        Self::with_path(config_path()?)
    }

    /// Create a config service backed by an explicit file
    pub fn with_path(config_path: PathBuf) -> AppResult<Self> {
        Self::with_registry_override(config_path, registry_url_override())
    }

    /// Create a config service whose effective registry URL is `registry_override`
    /// when set. The override is not written back to the file.
    pub fn with_registry_override(
        config_path: PathBuf,
        registry_override: Option<String>,
    ) -> AppResult<Self> {
        if let Some(parent) = config_path.parent() {
            ensure_dir(parent)?;
        }

        let stored = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            let default_config = AppConfig::default();
            Self::save_to_file(&config_path, &default_config)?;
            default_config
        };
        let config = stored.with_overrides(registry_override.as_deref());
        config.validate().map_err(AppError::config)?;

        Ok(Self {
            config_path,
            stored,
            registry_override,
            config,
        })
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> AppResult<AppConfig> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate().map_err(AppError::validation)?;
        Ok(config)
    }

    /// Save configuration to a file with pretty formatting
    fn save_to_file(path: &Path, config: &AppConfig) -> AppResult<()> {
        config.validate().map_err(AppError::validation)?;
        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn effective(&self, stored: &AppConfig) -> AppConfig {
        stored.with_overrides(self.registry_override.as_deref())
    }

    /// Get the current configuration
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// Get a clone of the current configuration
    pub fn get_config_clone(&self) -> AppConfig {
        self.config.clone()
    }

    /// Update the configuration with a partial update
    pub fn update_config(&mut self, update: SettingsUpdate) -> AppResult<AppConfig> {
        let mut next = self.stored.clone();
        next.apply_update(update);
        let effective = self.effective(&next);
        effective.validate().map_err(AppError::validation)?;
        Self::save_to_file(&self.config_path, &next)?;
        self.stored = next;
        self.config = effective;
        Ok(self.config.clone())
    }

    /// Reload configuration from disk
    pub fn reload(&mut self) -> AppResult<()> {
        let stored = Self::load_from_file(&self.config_path)?;
        self.config = self.effective(&stored);
        self.stored = stored;
        Ok(())
    }
}
