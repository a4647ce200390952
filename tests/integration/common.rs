//! Shared Integration Fixtures
//!
//! Plugins in these tests are small `sh` scripts speaking the line protocol.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;

use beacon_core::{Bounds, CoreResult, RenderSurface, SurfaceFactory};
use beacon_desktop::services::plugins::{
    PluginRuntime, RegistryClient, RegistryListing, RuntimeConfig,
};
use beacon_desktop::utils::error::{AppError, AppResult};

// ============================================================================
// Plugin Fixtures
// ============================================================================

const SCRIPT: &str = r#"while IFS= read -r line; do
  case "$line" in
    *'"method":"actions"'*)
      printf '%s\n' '{"result":__ACTIONS__}'
      ;;
    *'"method":"run"'*)
      action=$(printf '%s' "$line" | sed -n 's/.*"action":"\([^"]*\)".*/\1/p')
      keyword=$(printf '%s' "$line" | sed -n 's/.*"keyword":"\([^"]*\)".*/\1/p')
      printf '{"result":{"plugin":"%s","action":"%s","keyword":"%s"}}\n' "$BEACON_PLUGIN_ID" "$action" "$keyword"
      ;;
    *)
      printf '%s\n' '{"error":"unknown method"}'
      ;;
  esac
done
"#;

/// A single `run` action with the given title.
pub fn run_action(title: &str) -> String {
    format!(
        r#"[{{"id":"run","title":"{}","description":"Runs {}"}}]"#,
        title,
        title.to_lowercase()
    )
}

/// Manifest JSON for a shell plugin.
pub fn manifest(name: &str, version: &str) -> String {
    format!(
        r#"{{"name":"{}","version":"{}","description":"{} plugin","main":"main.sh","keywords":["beacon-plugin"]}}"#,
        name, version, name
    )
}

/// Shell entry answering `actions` with `actions`.
pub fn script(actions: &str) -> String {
    SCRIPT.replace("__ACTIONS__", actions)
}

/// Write `<root>/<dir_name>` as a shell plugin.
pub fn write_plugin(root: &Path, dir_name: &str, actions: &str) -> PathBuf {
    let dir = root.join(dir_name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("package.json"), manifest(dir_name, "1.0.0")).unwrap();
    std::fs::write(dir.join("main.sh"), script(actions)).unwrap();
    dir
}

/// Write `<root>/<dir_name>` with a manifest that does not parse.
pub fn write_broken_plugin(root: &Path, dir_name: &str) -> PathBuf {
    let dir = root.join(dir_name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("package.json"), "{ \"name\": ").unwrap();
    dir
}

/// Gzip tarball laid out the way registries publish packages.
pub fn plugin_tarball(name: &str, version: &str, actions: &str) -> Vec<u8> {
    let files = [
        ("package/package.json", manifest(name, version)),
        ("package/main.sh", script(actions)),
    ];
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, content) in &files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, path, content.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

pub fn listing(name: &str, version: &str) -> RegistryListing {
    RegistryListing {
        name: name.to_string(),
        version: version.to_string(),
        description: format!("{} plugin", name),
        keywords: vec!["beacon-plugin".to_string()],
        author: Some("Beacon Team".to_string()),
        artifact_url: None,
    }
}

// ============================================================================
// Fake Registry
// ============================================================================

/// Registry serving fixed listings and tarballs, counting searches.
#[derive(Default)]
pub struct CountingRegistry {
    pub searches: AtomicUsize,
    listings: Mutex<Vec<RegistryListing>>,
    artifacts: Mutex<Vec<(String, Vec<u8>)>>,
}

impl CountingRegistry {
    pub fn publish(&self, listing: RegistryListing, artifact: Vec<u8>) {
        self.artifacts
            .lock()
            .unwrap()
            .push((listing.name.clone(), artifact));
        self.listings.lock().unwrap().push(listing);
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryClient for CountingRegistry {
    fn registry_url(&self) -> &str {
        "https://registry.test"
    }

    async fn search(&self, _keyword: &str) -> AppResult<Vec<RegistryListing>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self.listings.lock().unwrap().clone())
    }

    async fn fetch_artifact(&self, listing: &RegistryListing) -> AppResult<Vec<u8>> {
        self.artifacts
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| *name == listing.name)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| AppError::registry(format!("no artifact for {}", listing.name)))
    }
}

// ============================================================================
// Recording Surfaces
// ============================================================================

#[derive(Default)]
pub struct SurfaceLog {
    events: Mutex<Vec<String>>,
}

impl SurfaceLog {
    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

struct RecordingSurface {
    id: String,
    log: Arc<SurfaceLog>,
}

impl RenderSurface for RecordingSurface {
    fn navigate(&self, url: &str) -> CoreResult<()> {
        self.log.push(format!("navigate {} {}", self.id, url));
        Ok(())
    }

    fn attach(&self, _bounds: Bounds) -> CoreResult<()> {
        self.log.push(format!("attach {}", self.id));
        Ok(())
    }

    fn detach(&self) -> CoreResult<()> {
        self.log.push(format!("detach {}", self.id));
        Ok(())
    }

    fn is_devtools_open(&self) -> bool {
        false
    }

    fn set_devtools_open(&self, _open: bool) -> CoreResult<()> {
        Ok(())
    }

    fn destroy(&self) -> CoreResult<()> {
        self.log.push(format!("destroy {}", self.id));
        Ok(())
    }
}

pub struct RecordingFactory(pub Arc<SurfaceLog>);

impl SurfaceFactory for RecordingFactory {
    fn create(&self, view_id: &str) -> CoreResult<Box<dyn RenderSurface>> {
        self.0.push(format!("create {}", view_id));
        Ok(Box::new(RecordingSurface {
            id: view_id.to_string(),
            log: Arc::clone(&self.0),
        }))
    }
}

// ============================================================================
// Runtime Fixture
// ============================================================================

pub struct Harness {
    pub tmp: tempfile::TempDir,
    pub dev_root: PathBuf,
    pub user_root: PathBuf,
    pub registry: Arc<CountingRegistry>,
    pub surfaces: Arc<SurfaceLog>,
    pub runtime: Arc<PluginRuntime>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_registry(CountingRegistry::default())
    }

    pub fn with_registry(registry: CountingRegistry) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let dev_root = tmp.path().join("dev");
        let user_root = tmp.path().join("user");
        std::fs::create_dir_all(&dev_root).unwrap();
        std::fs::create_dir_all(&user_root).unwrap();

        let registry = Arc::new(registry);
        let surfaces = Arc::new(SurfaceLog::default());
        let runtime = Arc::new(PluginRuntime::new(
            RuntimeConfig::for_roots(&dev_root, &user_root),
            Arc::clone(&registry) as Arc<dyn RegistryClient>,
            Arc::new(RecordingFactory(Arc::clone(&surfaces))),
            None,
        ));

        Self {
            tmp,
            dev_root,
            user_root,
            registry,
            surfaces,
            runtime,
        }
    }
}
