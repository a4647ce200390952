//! Settings Models
//!
//! Application configuration and settings data structures.

use serde::{Deserialize, Serialize};

/// Environment override for the registry base URL
pub const REGISTRY_URL_ENV: &str = "BEACON_REGISTRY_URL";

/// Public npm registry
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Keyword searched on the registry
pub const DEFAULT_SEARCH_KEYWORD: &str = "beacon-plugin";

/// Registry URL override from the environment, if set and non-blank
pub fn registry_url_override() -> Option<String> {
    std::env::var(REGISTRY_URL_ENV)
        .ok()
        .filter(|url| !url.trim().is_empty())
}

/// Application configuration stored in config.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Development plugin root (None = `<data_dir>/beacon/dev-plugins`)
    #[serde(default)]
    pub dev_plugins_dir: Option<String>,
    /// Registry base URL
    #[serde(default = "default_registry_url")]
    pub registry_url: String,
    /// Keyword used for registry discovery
    #[serde(default = "default_search_keyword")]
    pub search_keyword: String,
    /// Listings must declare at least one of these keywords
    #[serde(default = "default_allowed_keywords")]
    pub allowed_keywords: Vec<String>,
    /// Registry cache TTL in seconds
    #[serde(default = "default_registry_ttl_secs")]
    pub registry_ttl_secs: u64,
    /// Per-request timeout for plugin modules in seconds
    #[serde(default = "default_module_timeout_secs")]
    pub module_timeout_secs: u64,
    /// Reload dev plugins when their files change
    #[serde(default = "default_true")]
    pub watch_dev_plugins: bool,
    /// Enable debug mode (allows plugin devtools in release builds)
    #[serde(default)]
    pub debug_mode: bool,
    /// Log filter directive, e.g. "info" or "beacon_desktop=debug"
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_registry_url() -> String {
    DEFAULT_REGISTRY_URL.to_string()
}

fn default_search_keyword() -> String {
    DEFAULT_SEARCH_KEYWORD.to_string()
}

fn default_allowed_keywords() -> Vec<String> {
    vec!["beacon-plugin".to_string(), "beacon-extension".to_string()]
}

fn default_registry_ttl_secs() -> u64 {
    3600
}

fn default_module_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dev_plugins_dir: None,
            registry_url: default_registry_url(),
            search_keyword: default_search_keyword(),
            allowed_keywords: default_allowed_keywords(),
            registry_ttl_secs: default_registry_ttl_secs(),
            module_timeout_secs: default_module_timeout_secs(),
            watch_dev_plugins: true,
            debug_mode: false,
            log_level: default_log_level(),
        }
    }
}

/// Settings update request (partial update)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsUpdate {
    pub dev_plugins_dir: Option<String>,
    pub registry_url: Option<String>,
    pub search_keyword: Option<String>,
    pub allowed_keywords: Option<Vec<String>>,
    pub registry_ttl_secs: Option<u64>,
    pub module_timeout_secs: Option<u64>,
    pub watch_dev_plugins: Option<bool>,
    pub debug_mode: Option<bool>,
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(dir) = update.dev_plugins_dir {
            self.dev_plugins_dir = if dir.trim().is_empty() { None } else { Some(dir) };
        }
        if let Some(url) = update.registry_url {
            self.registry_url = url;
        }
        if let Some(keyword) = update.search_keyword {
            self.search_keyword = keyword;
        }
        if let Some(keywords) = update.allowed_keywords {
            self.allowed_keywords = keywords;
        }
        if let Some(ttl) = update.registry_ttl_secs {
            self.registry_ttl_secs = ttl;
        }
        if let Some(timeout) = update.module_timeout_secs {
            self.module_timeout_secs = timeout;
        }
        if let Some(watch) = update.watch_dev_plugins {
            self.watch_dev_plugins = watch;
        }
        if let Some(debug) = update.debug_mode {
            self.debug_mode = debug;
        }
        if let Some(level) = update.log_level {
            self.log_level = level;
        }
    }

    /// Copy of this configuration with runtime overrides applied.
    ///
    /// Overrides never reach config.json.
    pub fn with_overrides(&self, registry_url: Option<&str>) -> AppConfig {
        let mut config = self.clone();
        if let Some(url) = registry_url {
            config.registry_url = url.to_string();
        }
        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        match url::Url::parse(&self.registry_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            _ => return Err(format!("Invalid registry_url: {}", self.registry_url)),
        }

        if self.search_keyword.trim().is_empty() {
            return Err("search_keyword cannot be empty".to_string());
        }

        if self.allowed_keywords.is_empty() {
            return Err("allowed_keywords must contain at least one keyword".to_string());
        }

        if self.registry_ttl_secs < 60 {
            return Err("registry_ttl_secs must be at least 60 seconds".to_string());
        }

        if self.module_timeout_secs == 0 || self.module_timeout_secs > 300 {
            return Err("module_timeout_secs must be between 1 and 300".to_string());
        }

        if self.log_level.trim().is_empty() {
            return Err("log_level cannot be empty".to_string());
        }

        Ok(())
    }
}
