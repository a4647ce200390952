//! Dev Plugin Watcher
//!
//! Watches the development root and invalidates the cached module of any
//! plugin whose files change, so the next load runs the edited code.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::services::plugins::module_loader::ModuleLoader;
use crate::utils::error::{AppError, AppResult};

/// Debounce window for bursts of edits
const DEBOUNCE_MS: u64 = 300;

/// Running watcher over the dev root. Stops when dropped.
pub struct DevPluginWatcher {
    root: PathBuf,
    _debouncer: Debouncer<RecommendedWatcher>,
    task: JoinHandle<()>,
}

impl DevPluginWatcher {
    /// Start watching `dev_root`. Must be called inside a tokio runtime.
    pub fn start(dev_root: &Path, loader: Arc<ModuleLoader>) -> AppResult<Self> {
        let root = dev_root.canonicalize().map_err(|e| {
            AppError::not_found(format!("dev plugin root {}: {}", dev_root.display(), e))
        })?;

        let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();
        let callback_root = root.clone();

        let mut debouncer = new_debouncer(
            Duration::from_millis(DEBOUNCE_MS),
            move |result: Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    let changed: HashSet<PathBuf> = events
                        .iter()
                        .filter_map(|event| plugin_dir_for(&callback_root, &event.path))
                        .collect();
                    for dir in changed {
                        let _ = tx.send(dir);
                    }
                }
                Err(error) => {
                    tracing::warn!("dev plugin watcher error: {}", error);
                }
            },
        )
        .map_err(|e| AppError::internal(format!("Failed to create watcher: {}", e)))?;

        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| AppError::internal(format!("Failed to watch {}: {}", root.display(), e)))?;

        let task = tokio::spawn(async move {
            while let Some(dir) = rx.recv().await {
                let evicted = loader.invalidate_under(&dir).await;
                tracing::info!(
                    plugin_dir = %dir.display(),
                    evicted,
                    "dev plugin changed; module will reload on next use"
                );
            }
        });

        tracing::info!(root = %root.display(), "watching dev plugins");
        Ok(Self {
            root,
            _debouncer: debouncer,
            task,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for DevPluginWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for DevPluginWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevPluginWatcher")
            .field("root", &self.root)
            .finish()
    }
}

/// Plugin directory (`<root>/<name>`) containing `path`.
fn plugin_dir_for(root: &Path, path: &Path) -> Option<PathBuf> {
    let relative = path.strip_prefix(root).ok()?;
    match relative.components().next()? {
        Component::Normal(name) => Some(root.join(name)),
        _ => None,
    }
}
