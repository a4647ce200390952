//! Package Sources
//!
//! A package source scans one root directory for plugin candidates. The dev
//! root and the per-user root use the same implementation; only the root and
//! the provenance tag differ.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use beacon_core::{validate_plugin_dir, PluginEntity, Provenance};

use crate::services::plugins::module_loader::{ModuleLoader, PluginModule};
use crate::utils::error::AppResult;

/// Scans a root directory for plugin packages.
#[derive(Debug, Clone)]
pub struct PackageSource {
    root: PathBuf,
    provenance: Provenance,
    loader: Arc<ModuleLoader>,
}

impl PackageSource {
    pub fn new(root: impl Into<PathBuf>, provenance: Provenance, loader: Arc<ModuleLoader>) -> Self {
        Self {
            root: root.into(),
            provenance,
            loader,
        }
    }

    /// Root directory scanned by this source.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Every immediate subdirectory of the root, valid or not.
    ///
    /// Hidden directories are skipped; the installer stages archives in them.
    pub fn list_candidates(&self) -> Vec<PluginEntity> {
        let mut candidates = Vec::new();

        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                if self.root.exists() {
                    tracing::warn!(
                        provenance = %self.provenance,
                        "Failed to read plugin root {}: {}",
                        self.root.display(),
                        e
                    );
                }
                return candidates;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let hidden = path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true);
            if hidden {
                continue;
            }

            let (manifest, validation) = validate_plugin_dir(&path);
            let entity = match manifest {
                Some(manifest) => {
                    PluginEntity::from_manifest(&manifest, self.provenance, &path, validation)
                }
                None => PluginEntity::unreadable(&path, self.provenance, validation),
            };
            candidates.push(entity);
        }

        sort_by_name(&mut candidates);
        candidates
    }

    /// Valid plugins under the root, sorted by name (case-insensitive).
    ///
    /// Never fails: invalid candidates are logged and skipped. Each entity
    /// carries the status of its cached module, if any.
    pub async fn get_all_plugins(&self) -> Vec<PluginEntity> {
        let mut plugins = Vec::new();
        for mut entity in self.list_candidates() {
            if !entity.validation.is_valid {
                tracing::warn!(
                    provenance = %self.provenance,
                    plugin = %entity.id,
                    "Skipping invalid plugin: {}",
                    entity.validation.errors.join("; ")
                );
                continue;
            }
            self.loader.annotate(&mut entity).await;
            plugins.push(entity);
        }
        plugins
    }

    /// Linear lookup over `get_all_plugins`.
    pub async fn find(&self, id: &str) -> Option<PluginEntity> {
        self.get_all_plugins().await.into_iter().find(|p| p.id == id)
    }

    pub async fn has(&self, id: &str) -> bool {
        self.find(id).await.is_some()
    }

    /// Load (or reload) the module of `entity`, evicting the cached one.
    pub async fn load_plugin_module(&self, entity: &mut PluginEntity) -> AppResult<Arc<PluginModule>> {
        self.loader.load(entity).await
    }

    /// Return the cached module of `entity`, loading it when needed.
    pub async fn ensure_loaded(&self, entity: &mut PluginEntity) -> AppResult<Arc<PluginModule>> {
        self.loader.ensure_loaded(entity).await
    }
}

fn sort_by_name(entities: &mut [PluginEntity]) {
    entities.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
}
