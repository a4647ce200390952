//! Plugin Entity
//!
//! The single shape every plugin takes regardless of where it was found:
//! a local development package, a package in the per-user plugin root, or a
//! listing on the public registry.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::manifest::PluginManifest;

/// Where a plugin was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// In-progress package under the development root (highest priority)
    Dev,
    /// Package installed into the per-user plugin root
    User,
    /// Package listed on the public registry
    Remote,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::Dev => write!(f, "dev"),
            Provenance::User => write!(f, "user"),
            Provenance::Remote => write!(f, "remote"),
        }
    }
}

/// Module lifecycle of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginStatus {
    Discovered,
    Loading,
    Loaded,
    Error,
}

/// Outcome of manifest validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl Validation {
    /// A passing validation.
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
        }
    }

    /// Build a validation from collected errors; valid iff there are none.
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Registry coordinates of a remote plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePackageRef {
    /// Package name as published
    pub package_name: String,
    /// Published version
    pub version: String,
    /// Registry base URL the listing came from
    pub registry: String,
    /// Artifact (tarball) location, when the listing carried one
    #[serde(default)]
    pub artifact_url: Option<String>,
}

/// A discovered plugin.
///
/// `root_path` is `None` exactly when the plugin is a registry listing that
/// has not been installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginEntity {
    pub id: String,
    pub name: String,
    pub version: String,
    pub author: Option<String>,
    pub description: String,
    pub keywords: Vec<String>,
    pub provenance: Provenance,
    pub root_path: Option<PathBuf>,
    /// Entry module relative to `root_path`
    pub entry_point: String,
    /// Interpreter for the entry module (`None` = execute directly)
    pub runtime: Option<String>,
    pub validation: Validation,
    pub status: PluginStatus,
    pub last_error: Option<String>,
    pub remote: Option<RemotePackageRef>,
}

impl PluginEntity {
    /// Build a local (dev/user) entity from a parsed manifest.
    pub fn from_manifest(
        manifest: &PluginManifest,
        provenance: Provenance,
        root: &Path,
        validation: Validation,
    ) -> Self {
        Self {
            id: manifest.id(),
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            author: manifest.author.clone(),
            description: manifest.description.clone(),
            keywords: manifest.keywords.clone(),
            provenance,
            root_path: Some(root.to_path_buf()),
            entry_point: manifest.entry_point().to_string(),
            runtime: manifest.resolve_runtime(),
            validation,
            status: PluginStatus::Discovered,
            last_error: None,
            remote: None,
        }
    }

    /// Build an entity for a directory whose manifest could not be read.
    ///
    /// The directory name stands in for the missing id and name.
    pub fn unreadable(root: &Path, provenance: Provenance, validation: Validation) -> Self {
        let dir_name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            id: dir_name.clone(),
            name: dir_name,
            version: String::new(),
            author: None,
            description: String::new(),
            keywords: vec![],
            provenance,
            root_path: Some(root.to_path_buf()),
            entry_point: String::new(),
            runtime: None,
            validation,
            status: PluginStatus::Discovered,
            last_error: None,
            remote: None,
        }
    }

    /// Build a registry entity. `installed_root` is the user-root directory
    /// when the package has been installed.
    pub fn remote(
        manifest: &PluginManifest,
        package: RemotePackageRef,
        installed_root: Option<PathBuf>,
    ) -> Self {
        Self {
            id: manifest.id(),
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            author: manifest.author.clone(),
            description: manifest.description.clone(),
            keywords: manifest.keywords.clone(),
            provenance: Provenance::Remote,
            root_path: installed_root,
            entry_point: manifest.entry_point().to_string(),
            runtime: manifest.resolve_runtime(),
            validation: Validation::valid(),
            status: PluginStatus::Discovered,
            last_error: None,
            remote: Some(package),
        }
    }

    /// Whether the plugin has code on disk.
    pub fn is_installed(&self) -> bool {
        self.root_path.is_some()
    }

    /// Absolute path of the entry module, if the plugin is on disk.
    pub fn entry_path(&self) -> Option<PathBuf> {
        self.root_path.as_ref().map(|root| root.join(&self.entry_point))
    }

    /// Move to a new status, rejecting edges outside
    /// `discovered -> loading -> {loaded, error}`.
    pub fn transition(&mut self, next: PluginStatus) -> CoreResult<()> {
        let allowed = matches!(
            (self.status, next),
            (PluginStatus::Discovered, PluginStatus::Loading)
                | (PluginStatus::Loading, PluginStatus::Loaded)
                | (PluginStatus::Loading, PluginStatus::Error)
        );
        if !allowed {
            return Err(CoreError::validation(format!(
                "Plugin '{}' cannot move from {:?} to {:?}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Forget any module state; used when the cached module is invalidated.
    pub fn reset(&mut self) {
        self.status = PluginStatus::Discovered;
        self.last_error = None;
    }
}
