//! Plugin Manifest
//!
//! Plugins are npm-style packages: each plugin directory carries a
//! `package.json` describing the plugin and pointing at its entry module.
//!
//! ```json
//! {
//!   "name": "echo",
//!   "version": "1.0.0",
//!   "description": "Replies to pings",
//!   "author": { "name": "someone" },
//!   "main": "index.js",
//!   "keywords": ["beacon-plugin"],
//!   "runtime": "node"
//! }
//! ```

use std::path::{Component, Path};

use serde::{Deserialize, Deserializer, Serialize};

use crate::action::ACTION_SEPARATOR;
use crate::entity::Validation;
use crate::error::{CoreError, CoreResult};

/// File name of the manifest inside a plugin directory.
pub const MANIFEST_FILE: &str = "package.json";

/// Entry used when the manifest omits `main`.
pub const DEFAULT_ENTRY: &str = "index.js";

/// Plugin manifest parsed from package.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Package name; the plugin id is derived from it
    #[serde(default)]
    pub name: String,
    /// Semantic version
    #[serde(default)]
    pub version: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Author name (accepts both `"author": "name"` and `"author": { "name": "...", "url": "..." }`)
    #[serde(default, deserialize_with = "deserialize_author")]
    pub author: Option<String>,
    /// Entry module, relative to the plugin directory
    #[serde(default)]
    pub main: Option<String>,
    /// Registry keywords
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Interpreter used to run the entry (inferred from the extension when absent)
    #[serde(default)]
    pub runtime: Option<String>,
}

/// Deserialize `author` from either a plain string or an object `{ "name": "...", ... }`.
fn deserialize_author<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Object(map)) => Ok(map
            .get("name")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())),
        Some(_) => Ok(None),
    }
}

impl PluginManifest {
    /// Read and parse the manifest of a plugin directory.
    pub fn from_dir(dir: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(dir.join(MANIFEST_FILE))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Plugin id derived from the package name.
    pub fn id(&self) -> String {
        plugin_id_from_name(&self.name)
    }

    /// Entry module path relative to the plugin root.
    pub fn entry_point(&self) -> &str {
        self.main
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_ENTRY)
    }

    /// Interpreter for the entry module, or `None` to execute it directly.
    pub fn resolve_runtime(&self) -> Option<String> {
        if let Some(runtime) = self.runtime.as_deref().filter(|r| !r.trim().is_empty()) {
            return Some(runtime.to_string());
        }
        let extension = Path::new(self.entry_point())
            .extension()
            .and_then(|e| e.to_str())?;
        match extension {
            "js" | "mjs" | "cjs" => Some("node".to_string()),
            "py" => Some("python3".to_string()),
            "sh" => Some("sh".to_string()),
            _ => None,
        }
    }
}

/// Derive a plugin id from a package name.
///
/// Scoped names lose their leading `@` and the scope separator becomes `-`,
/// so `@acme/echo` maps to `acme-echo`.
pub fn plugin_id_from_name(name: &str) -> String {
    name.trim().trim_start_matches('@').replace('/', "-")
}

/// Check that an entry path stays inside the plugin root.
fn is_contained_relative(entry: &str) -> bool {
    let path = Path::new(entry);
    !path.is_absolute()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Validate a candidate plugin directory.
///
/// Every problem found is recorded instead of stopping at the first one. The
/// manifest is returned whenever it parsed, even if the plugin is invalid.
pub fn validate_plugin_dir(dir: &Path) -> (Option<PluginManifest>, Validation) {
    let mut errors = Vec::new();

    let manifest = match PluginManifest::from_dir(dir) {
        Ok(m) => Some(m),
        Err(CoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            errors.push(format!("{} not found", MANIFEST_FILE));
            None
        }
        Err(e) => {
            errors.push(format!("Invalid {}: {}", MANIFEST_FILE, e));
            None
        }
    };

    if let Some(ref manifest) = manifest {
        let id = manifest.id();
        if id.is_empty() {
            errors.push("Manifest must have a non-empty 'name' field".to_string());
        } else if id.contains(ACTION_SEPARATOR) {
            errors.push(format!(
                "Plugin id '{}' must not contain '{}'",
                id, ACTION_SEPARATOR
            ));
        }

        let entry = manifest.entry_point();
        if !is_contained_relative(entry) {
            errors.push(format!("Entry '{}' must be relative to the plugin root", entry));
        } else if !dir.join(entry).is_file() {
            errors.push(format!("Entry file '{}' does not exist", entry));
        }
    }

    (manifest, Validation::from_errors(errors))
}
