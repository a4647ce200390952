//! Module Loader
//!
//! Loads plugin entry modules and keeps them in a cache keyed by the
//! resolved entry path.
//!
//! A module is a child process running the plugin's entry file. The host
//! talks to it over stdin/stdout with one JSON object per line:
//!
//! ```text
//! host  -> {"method":"actions"}
//! child <- {"result":[{"id":"ping","title":"Ping"}]}
//! host  -> {"method":"run","action":"ping","keyword":"hello"}
//! child <- {"result":"pong"}            (or {"error":"..."})
//! ```
//!
//! Loading always evicts the cached process for the path first, so edits to
//! the entry file take effect on the next load. Any state the old process
//! held is discarded.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::RwLock;

use beacon_core::{ModuleAction, PluginEntity, PluginStatus};

use crate::utils::error::{AppError, AppResult};

/// Default per-request timeout for plugin modules.
pub const DEFAULT_MODULE_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable carrying the plugin id into the child.
pub const PLUGIN_ID_ENV: &str = "BEACON_PLUGIN_ID";

/// Environment variable carrying the plugin root into the child.
pub const PLUGIN_ROOT_ENV: &str = "BEACON_PLUGIN_ROOT";

// ============================================================================
// Wire Protocol
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(tag = "method", rename_all = "lowercase")]
enum ModuleRequest<'a> {
    Actions,
    Run { action: &'a str, keyword: &'a str },
}

/// A reply line carries exactly one of `result` or `error`. Any other JSON
/// object on stdout is plugin output, not a reply.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModuleReply {
    Result(ResultReply),
    Error(ErrorReply),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResultReply {
    result: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ErrorReply {
    error: Value,
}

impl ErrorReply {
    fn message(self) -> String {
        match self.error {
            Value::String(message) => message,
            other => other.to_string(),
        }
    }
}

// ============================================================================
// Plugin Module
// ============================================================================

struct ModuleProcess {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// A running plugin module.
pub struct PluginModule {
    plugin_id: String,
    entry: PathBuf,
    timeout: Duration,
    process: tokio::sync::Mutex<ModuleProcess>,
    alive: AtomicBool,
}

impl PluginModule {
    /// Start the entry module of `entity`.
    async fn spawn(entity: &PluginEntity, entry: &Path, timeout: Duration) -> AppResult<Self> {
        let root = entity
            .root_path
            .as_deref()
            .ok_or_else(|| AppError::ModuleNotFound(format!("plugin '{}' is not installed", entity.id)))?;

        let mut cmd = match entity.runtime.as_deref() {
            Some(runtime) => {
                let mut parts = runtime.split_whitespace();
                let program = parts.next().unwrap_or(runtime);
                let mut c = Command::new(program);
                c.args(parts);
                c.arg(entry);
                c
            }
            None => Command::new(entry),
        };

        cmd.current_dir(root)
            .env(PLUGIN_ID_ENV, &entity.id)
            .env(PLUGIN_ROOT_ENV, root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            AppError::module_load(format!(
                "Failed to start plugin '{}' ({}): {}",
                entity.id,
                entry.display(),
                e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::module_load("Failed to capture plugin stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::module_load("Failed to capture plugin stdout"))?;

        if let Some(stderr) = child.stderr.take() {
            let plugin_id = entity.id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(plugin = %plugin_id, "{}", line);
                }
            });
        }

        Ok(Self {
            plugin_id: entity.id.clone(),
            entry: entry.to_path_buf(),
            timeout,
            process: tokio::sync::Mutex::new(ModuleProcess {
                child,
                stdin: BufWriter::new(stdin),
                stdout: BufReader::new(stdout).lines(),
            }),
            alive: AtomicBool::new(true),
        })
    }

    /// Plugin id this module was started for.
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Resolved entry path (the cache key).
    pub fn entry(&self) -> &Path {
        &self.entry
    }

    /// Whether the child is still usable.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Ask the module for its actions.
    pub async fn list_actions(&self) -> AppResult<Vec<ModuleAction>> {
        let value = self.request(&ModuleRequest::Actions).await?;
        serde_json::from_value(value).map_err(|e| {
            AppError::module_load(format!(
                "Plugin '{}' returned a malformed action list: {}",
                self.plugin_id, e
            ))
        })
    }

    /// Invoke the handler of a local action.
    pub async fn run(&self, action: &str, keyword: &str) -> AppResult<Value> {
        self.request(&ModuleRequest::Run { action, keyword }).await
    }

    /// Kill the child process.
    pub async fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
        let mut process = self.process.lock().await;
        if let Err(e) = process.child.start_kill() {
            tracing::debug!(plugin = %self.plugin_id, "kill failed: {}", e);
        }
    }

    async fn request(&self, request: &ModuleRequest<'_>) -> AppResult<Value> {
        if !self.is_alive() {
            return Err(AppError::module_load(format!(
                "Plugin '{}' is not running",
                self.plugin_id
            )));
        }

        let mut line = serde_json::to_string(request)?;
        line.push('\n');

        let mut process = self.process.lock().await;
        let exchange = async {
            process.stdin.write_all(line.as_bytes()).await?;
            process.stdin.flush().await?;
            loop {
                match process.stdout.next_line().await? {
                    Some(reply) => {
                        let trimmed = reply.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<ModuleReply>(trimmed) {
                            Ok(parsed) => return Ok::<_, std::io::Error>(Some(parsed)),
                            // Stray output on stdout is not part of the protocol
                            Err(_) => {
                                tracing::debug!(plugin = %self.plugin_id, "stdout: {}", trimmed);
                            }
                        }
                    }
                    None => return Ok::<_, std::io::Error>(None),
                }
            }
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(Some(ModuleReply::Result(reply)))) => Ok(reply.result),
            Ok(Ok(Some(ModuleReply::Error(reply)))) => Err(AppError::action_failed(format!(
                "[{}] {}",
                self.plugin_id,
                reply.message()
            ))),
            Ok(Ok(None)) => {
                self.alive.store(false, Ordering::SeqCst);
                Err(AppError::module_load(format!(
                    "Plugin '{}' exited unexpectedly",
                    self.plugin_id
                )))
            }
            Ok(Err(e)) => {
                self.alive.store(false, Ordering::SeqCst);
                Err(AppError::module_load(format!(
                    "Plugin '{}' I/O failure: {}",
                    self.plugin_id, e
                )))
            }
            Err(_) => {
                // The reply may still arrive later and would desync the stream
                self.alive.store(false, Ordering::SeqCst);
                let _ = process.child.start_kill();
                Err(AppError::module_load(format!(
                    "Plugin '{}' timed out after {}ms",
                    self.plugin_id,
                    self.timeout.as_millis()
                )))
            }
        }
    }
}

impl std::fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginModule")
            .field("plugin_id", &self.plugin_id)
            .field("entry", &self.entry)
            .field("alive", &self.is_alive())
            .finish()
    }
}

// ============================================================================
// Module Loader
// ============================================================================

#[derive(Debug, Clone)]
struct ModuleState {
    status: PluginStatus,
    last_error: Option<String>,
}

/// Removes a path from the loading set when dropped.
struct LoadingGuard<'a> {
    loading: &'a Mutex<HashSet<PathBuf>>,
    path: PathBuf,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.loading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.path);
    }
}

/// Path-keyed module cache shared by every package source.
pub struct ModuleLoader {
    modules: RwLock<HashMap<PathBuf, Arc<PluginModule>>>,
    states: RwLock<HashMap<PathBuf, ModuleState>>,
    loading: Mutex<HashSet<PathBuf>>,
    timeout: Duration,
}

impl ModuleLoader {
    pub fn new(timeout: Duration) -> Self {
        Self {
            modules: RwLock::new(HashMap::new()),
            states: RwLock::new(HashMap::new()),
            loading: Mutex::new(HashSet::new()),
            timeout,
        }
    }

    fn lock_loading(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.loading.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve the absolute entry path of an entity.
    pub fn resolve_entry(entity: &PluginEntity) -> AppResult<PathBuf> {
        let entry = entity.entry_path().ok_or_else(|| {
            AppError::ModuleNotFound(format!("plugin '{}' is not installed", entity.id))
        })?;
        if !entry.is_file() {
            return Err(AppError::ModuleNotFound(entry.display().to_string()));
        }
        Ok(std::fs::canonicalize(&entry).unwrap_or(entry))
    }

    /// Load (or reload) the module of `entity`.
    ///
    /// The cached module for the entry path is evicted before the new one
    /// starts. The entity's status follows `discovered -> loading ->
    /// {loaded, error}`.
    pub async fn load(&self, entity: &mut PluginEntity) -> AppResult<Arc<PluginModule>> {
        entity.reset();
        let entry = match Self::resolve_entry(entity) {
            Ok(entry) => entry,
            Err(e) => {
                entity.transition(PluginStatus::Loading)?;
                entity.transition(PluginStatus::Error)?;
                entity.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        if !self.lock_loading().insert(entry.clone()) {
            return Err(AppError::ModuleBusy(format!(
                "plugin '{}' is already loading",
                entity.id
            )));
        }
        let _guard = LoadingGuard {
            loading: &self.loading,
            path: entry.clone(),
        };

        self.evict(&entry).await;

        entity.transition(PluginStatus::Loading)?;
        self.set_state(&entry, PluginStatus::Loading, None).await;

        match self.start(entity, &entry).await {
            Ok(module) => {
                let module = Arc::new(module);
                self.modules
                    .write()
                    .await
                    .insert(entry.clone(), Arc::clone(&module));
                self.set_state(&entry, PluginStatus::Loaded, None).await;
                entity.transition(PluginStatus::Loaded)?;
                tracing::info!(plugin = %entity.id, provenance = %entity.provenance, "plugin module loaded");
                Ok(module)
            }
            Err(e) => {
                let message = e.to_string();
                self.set_state(&entry, PluginStatus::Error, Some(message.clone()))
                    .await;
                entity.transition(PluginStatus::Error)?;
                entity.last_error = Some(message);
                tracing::warn!(plugin = %entity.id, "plugin module failed to load: {}", e);
                Err(e)
            }
        }
    }

    /// Spawn and handshake.
    async fn start(&self, entity: &PluginEntity, entry: &Path) -> AppResult<PluginModule> {
        let module = PluginModule::spawn(entity, entry, self.timeout).await?;
        if let Err(e) = module.list_actions().await {
            module.shutdown().await;
            return Err(AppError::module_load(format!(
                "Plugin '{}' failed its handshake: {}",
                entity.id, e
            )));
        }
        Ok(module)
    }

    /// Return the cached module of `entity`, loading it if absent or dead.
    pub async fn ensure_loaded(&self, entity: &mut PluginEntity) -> AppResult<Arc<PluginModule>> {
        if let Ok(entry) = Self::resolve_entry(entity) {
            if let Some(module) = self.get(&entry).await {
                if module.is_alive() {
                    entity.status = PluginStatus::Loaded;
                    entity.last_error = None;
                    return Ok(module);
                }
                tracing::info!(plugin = %entity.id, "plugin module exited, restarting");
            }
        }
        self.load(entity).await
    }

    /// Cached module for a resolved entry path.
    pub async fn get(&self, entry: &Path) -> Option<Arc<PluginModule>> {
        self.modules.read().await.get(entry).cloned()
    }

    /// Copy the cached status of an entity's module onto the entity.
    pub async fn annotate(&self, entity: &mut PluginEntity) {
        let Ok(entry) = Self::resolve_entry(entity) else {
            return;
        };
        if let Some(state) = self.states.read().await.get(&entry) {
            entity.status = state.status;
            entity.last_error = state.last_error.clone();
        }
    }

    /// Drop the cached module for one entry path.
    pub async fn invalidate(&self, entry: &Path) -> bool {
        let evicted = self.evict(entry).await;
        self.states.write().await.remove(entry);
        evicted
    }

    /// Drop every cached module whose entry lives under `dir`.
    pub async fn invalidate_under(&self, dir: &Path) -> usize {
        let dir = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        let doomed: Vec<PathBuf> = {
            let modules = self.modules.read().await;
            let states = self.states.read().await;
            modules
                .keys()
                .chain(states.keys())
                .filter(|p| p.starts_with(&dir))
                .cloned()
                .collect::<HashSet<_>>()
                .into_iter()
                .collect()
        };

        let mut count = 0;
        for entry in &doomed {
            if self.invalidate(entry).await {
                count += 1;
            }
        }
        if count > 0 {
            tracing::info!("invalidated {} plugin module(s) under {}", count, dir.display());
        }
        count
    }

    /// Stop every module.
    pub async fn shutdown_all(&self) {
        let modules: Vec<Arc<PluginModule>> =
            self.modules.write().await.drain().map(|(_, m)| m).collect();
        for module in modules {
            module.shutdown().await;
        }
        self.states.write().await.clear();
    }

    async fn evict(&self, entry: &Path) -> bool {
        let previous = self.modules.write().await.remove(entry);
        match previous {
            Some(module) => {
                module.shutdown().await;
                true
            }
            None => false,
        }
    }

    async fn set_state(&self, entry: &Path, status: PluginStatus, last_error: Option<String>) {
        self.states
            .write()
            .await
            .insert(entry.to_path_buf(), ModuleState { status, last_error });
    }
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MODULE_TIMEOUT)
    }
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("timeout", &self.timeout)
            .finish()
    }
}
