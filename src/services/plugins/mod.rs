//! Plugin Runtime Services
//!
//! Discovery, loading, execution, installation and presentation of Beacon
//! plugins.
//!
//! Architecture:
//! - source.rs:        Filesystem package sources (dev and user roots)
//! - remote.rs:        Registry client and cached remote package source
//! - module_loader.rs: Child-process plugin modules and their cache
//! - actions.rs:       Action aggregation and execution across sources
//! - market.rs:        Staged install and uninstall into the user root
//! - extract.rs:       Hardened tarball extraction
//! - views.rs:         Rendering surface registry
//! - webview.rs:       Tauri child webviews as rendering surfaces
//! - router.rs:        Channel registry behind the IPC boundary
//! - watcher.rs:       Dev root watcher driving module reloads
//! - runtime.rs:       Context object owning all of the above

pub mod actions;
pub mod extract;
pub mod market;
pub mod module_loader;
pub mod remote;
pub mod router;
pub mod runtime;
pub mod source;
pub mod views;
pub mod watcher;
pub mod webview;

#[cfg(test)]
mod test_support;

pub use actions::{ActionManager, ActionView};
pub use market::{InstallPhase, InstallProgress, MarketManager, ProgressObserver};
pub use module_loader::{ModuleLoader, PluginModule};
pub use remote::{NpmRegistryClient, RegistryClient, RegistryListing, RemotePackageSource};
pub use router::RequestRouter;
pub use runtime::{PluginRuntime, RuntimeConfig};
pub use source::PackageSource;
pub use views::{ViewInfo, ViewManager};
pub use watcher::DevPluginWatcher;
pub use webview::TauriSurfaceFactory;
