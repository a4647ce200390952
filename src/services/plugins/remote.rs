//! Remote Package Source
//!
//! Discovers installable plugins on the npm registry by keyword search and
//! exposes them as remote entities.
//!
//! ## Cache policy
//! - Listings are cached per search keyword with a TTL (default one hour).
//! - A read finding a fresh cache returns it without touching the network.
//! - A read finding a stale cache refreshes it, unless a refresh is already
//!   in flight, in which case the stale listings (or nothing) are returned.
//! - A background timer refreshes unconditionally every TTL interval.
//! - Network and parse failures keep the last good listings.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use beacon_core::{
    plugin_id_from_name, PluginEntity, PluginManifest, RemotePackageRef, MANIFEST_FILE,
};

use crate::services::plugins::module_loader::ModuleLoader;
use crate::utils::error::{AppError, AppResult};

/// Default registry cache lifetime.
pub const DEFAULT_REGISTRY_TTL: Duration = Duration::from_secs(3600);

/// Largest artifact accepted from the registry.
pub const MAX_ARTIFACT_SIZE: u64 = 100 * 1024 * 1024;

const SEARCH_PAGE_SIZE: &str = "250";

// ============================================================================
// Listings
// ============================================================================

/// A package as listed by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryListing {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// Tarball location when the listing carries one
    #[serde(default)]
    pub artifact_url: Option<String>,
}

impl RegistryListing {
    /// Plugin id derived from the package name.
    pub fn id(&self) -> String {
        plugin_id_from_name(&self.name)
    }

    fn has_allowed_keyword(&self, allowed: &HashSet<String>) -> bool {
        self.keywords
            .iter()
            .any(|k| allowed.contains(&k.trim().to_lowercase()))
    }

    fn to_manifest(&self) -> PluginManifest {
        PluginManifest {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            author: self.author.clone(),
            main: None,
            keywords: self.keywords.clone(),
            runtime: None,
        }
    }
}

// ============================================================================
// Registry Client
// ============================================================================

/// Network access to a package registry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Base URL of the registry.
    fn registry_url(&self) -> &str;

    /// Search packages tagged with `keyword`.
    async fn search(&self, keyword: &str) -> AppResult<Vec<RegistryListing>>;

    /// Download the gzip tarball of a listing.
    async fn fetch_artifact(&self, listing: &RegistryListing) -> AppResult<Vec<u8>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    objects: Vec<SearchObject>,
}

#[derive(Debug, Deserialize)]
struct SearchObject {
    package: SearchPackage,
}

#[derive(Debug, Deserialize)]
struct SearchPackage {
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    author: Option<NpmPerson>,
    #[serde(default)]
    publisher: Option<NpmPerson>,
}

#[derive(Debug, Deserialize)]
struct NpmPerson {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

impl NpmPerson {
    fn display_name(self) -> Option<String> {
        self.name.or(self.username)
    }
}

impl From<SearchPackage> for RegistryListing {
    fn from(package: SearchPackage) -> Self {
        Self {
            name: package.name,
            version: package.version,
            description: package.description.unwrap_or_default(),
            keywords: package.keywords,
            author: package
                .author
                .and_then(NpmPerson::display_name)
                .or_else(|| package.publisher.and_then(NpmPerson::display_name)),
            artifact_url: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VersionMetadata {
    dist: DistInfo,
}

#[derive(Debug, Deserialize)]
struct DistInfo {
    tarball: String,
}

/// Registry client for the npm HTTP API.
#[derive(Debug, Clone)]
pub struct NpmRegistryClient {
    client: reqwest::Client,
    registry_url: String,
}

impl NpmRegistryClient {
    pub fn new(registry_url: impl Into<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("beacon-desktop")
            .build()
            .map_err(|e| AppError::registry(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            registry_url: registry_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn resolve_tarball(&self, listing: &RegistryListing) -> AppResult<String> {
        let url = format!(
            "{}/{}/{}",
            self.registry_url,
            urlencoding::encode(&listing.name),
            urlencoding::encode(&listing.version)
        );
        tracing::debug!(url = %url, "fetching package metadata");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::registry(format!(
                "registry returned {} for {}@{}",
                response.status(),
                listing.name,
                listing.version
            )));
        }

        let metadata: VersionMetadata = response.json().await.map_err(|e| {
            AppError::registry(format!("failed to parse package metadata: {}", e))
        })?;
        Ok(metadata.dist.tarball)
    }
}

#[async_trait]
impl RegistryClient for NpmRegistryClient {
    fn registry_url(&self) -> &str {
        &self.registry_url
    }

    async fn search(&self, keyword: &str) -> AppResult<Vec<RegistryListing>> {
        let url = format!("{}/-/v1/search", self.registry_url);
        let text = format!("keywords:{}", keyword);

        let response = self
            .client
            .get(&url)
            .query(&[("text", text.as_str()), ("size", SEARCH_PAGE_SIZE)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::registry(format!(
                "HTTP {}: {}",
                response.status(),
                url
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::registry(format!("Failed to parse search results: {}", e)))?;

        Ok(parsed
            .objects
            .into_iter()
            .map(|o| RegistryListing::from(o.package))
            .collect())
    }

    async fn fetch_artifact(&self, listing: &RegistryListing) -> AppResult<Vec<u8>> {
        let tarball = match &listing.artifact_url {
            Some(url) => url.clone(),
            None => self.resolve_tarball(listing).await?,
        };
        tracing::debug!(url = %tarball, "downloading tarball");

        let response = self.client.get(&tarball).send().await?;
        if !response.status().is_success() {
            return Err(AppError::registry(format!(
                "tarball download failed with status {} for {}",
                response.status(),
                listing.name
            )));
        }

        if let Some(length) = response.content_length() {
            if length > MAX_ARTIFACT_SIZE {
                return Err(AppError::registry(format!(
                    "{} is too large ({} bytes, limit {})",
                    listing.name, length, MAX_ARTIFACT_SIZE
                )));
            }
        }

        let mut stream = response.bytes_stream();
        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if (buffer.len() + chunk.len()) as u64 > MAX_ARTIFACT_SIZE {
                return Err(AppError::registry(format!(
                    "{} exceeds the {} byte download limit",
                    listing.name, MAX_ARTIFACT_SIZE
                )));
            }
            buffer.extend_from_slice(&chunk);
        }

        Ok(buffer)
    }
}

// ============================================================================
// Remote Package Source
// ============================================================================

struct CacheEntry {
    listings: Vec<RegistryListing>,
    fetched_at: Instant,
}

/// Clears the refresh flag when dropped.
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Registry-backed plugin source with a keyword-keyed TTL cache.
pub struct RemotePackageSource {
    client: Arc<dyn RegistryClient>,
    keyword: String,
    allowed_keywords: HashSet<String>,
    ttl: Duration,
    user_root: PathBuf,
    loader: Arc<ModuleLoader>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    refreshing: AtomicBool,
}

impl RemotePackageSource {
    pub fn new(
        client: Arc<dyn RegistryClient>,
        keyword: impl Into<String>,
        allowed_keywords: &[String],
        ttl: Duration,
        user_root: impl Into<PathBuf>,
        loader: Arc<ModuleLoader>,
    ) -> Self {
        Self {
            client,
            keyword: keyword.into(),
            allowed_keywords: allowed_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            ttl,
            user_root: user_root.into(),
            loader,
            cache: RwLock::new(HashMap::new()),
            refreshing: AtomicBool::new(false),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Compatible listings for the search keyword.
    ///
    /// Served from the cache while it is younger than the TTL. Never fails.
    pub async fn get_packages(&self) -> Vec<RegistryListing> {
        if let Some(listings) = self.cached(true).await {
            return listings;
        }
        self.refresh().await
    }

    /// Query the registry now, unless a refresh is already running.
    ///
    /// Returns the refreshed listings, or the current cache (possibly empty)
    /// when the query fails or another refresh holds the flag.
    pub async fn refresh(&self) -> Vec<RegistryListing> {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(keyword = %self.keyword, "registry refresh in flight, serving cache");
            return self.cached(false).await.unwrap_or_default();
        }
        let _guard = RefreshGuard(&self.refreshing);

        match self.client.search(&self.keyword).await {
            Ok(listings) => {
                let listings = self.accept(listings);
                tracing::info!(
                    keyword = %self.keyword,
                    "registry returned {} compatible package(s)",
                    listings.len()
                );
                self.cache.write().await.insert(
                    self.keyword.clone(),
                    CacheEntry {
                        listings: listings.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                listings
            }
            Err(e) => {
                tracing::warn!(keyword = %self.keyword, "registry query failed: {}", e);
                self.cached(false).await.unwrap_or_default()
            }
        }
    }

    /// Remote entities for every listing, marking installed ones.
    pub async fn get_plugins(&self) -> Vec<PluginEntity> {
        let mut plugins = Vec::new();
        for listing in self.get_packages().await {
            let mut entity = self.to_entity(&listing);
            self.loader.annotate(&mut entity).await;
            plugins.push(entity);
        }
        plugins
    }

    /// Remote entities whose package is present in the user root.
    pub async fn get_installed_plugins(&self) -> Vec<PluginEntity> {
        self.get_plugins()
            .await
            .into_iter()
            .filter(PluginEntity::is_installed)
            .collect()
    }

    /// Listing for a plugin id in the current package set.
    pub async fn find_listing(&self, plugin_id: &str) -> Option<RegistryListing> {
        self.get_packages()
            .await
            .into_iter()
            .find(|l| l.id() == plugin_id)
    }

    /// Download the artifact of a listing.
    pub async fn fetch_artifact(&self, listing: &RegistryListing) -> AppResult<Vec<u8>> {
        self.client.fetch_artifact(listing).await
    }

    /// Refresh every TTL interval until `cancel` fires.
    pub fn spawn_refresh_timer(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let source = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + source.ttl, source.ttl);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("registry refresh timer stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        source.refresh().await;
                    }
                }
            }
        })
    }

    async fn cached(&self, fresh_only: bool) -> Option<Vec<RegistryListing>> {
        let cache = self.cache.read().await;
        let entry = cache.get(&self.keyword)?;
        if fresh_only && entry.fetched_at.elapsed() >= self.ttl {
            return None;
        }
        Some(entry.listings.clone())
    }

    /// Keep listings carrying an allowed keyword, first listing per id wins.
    fn accept(&self, listings: Vec<RegistryListing>) -> Vec<RegistryListing> {
        let mut seen = HashSet::new();
        let mut accepted: Vec<RegistryListing> = listings
            .into_iter()
            .filter(|l| l.has_allowed_keyword(&self.allowed_keywords))
            .filter(|l| seen.insert(l.id()))
            .collect();
        accepted.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        accepted
    }

    fn to_entity(&self, listing: &RegistryListing) -> PluginEntity {
        let package = RemotePackageRef {
            package_name: listing.name.clone(),
            version: listing.version.clone(),
            registry: self.client.registry_url().to_string(),
            artifact_url: listing.artifact_url.clone(),
        };

        let installed = self.user_root.join(listing.id());
        if installed.join(MANIFEST_FILE).is_file() {
            if let Ok(manifest) = PluginManifest::from_dir(&installed) {
                return PluginEntity::remote(&manifest, package, Some(installed));
            }
        }
        PluginEntity::remote(&listing.to_manifest(), package, None)
    }
}

impl std::fmt::Debug for RemotePackageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemotePackageSource")
            .field("registry", &self.client.registry_url())
            .field("keyword", &self.keyword)
            .field("ttl", &self.ttl)
            .finish()
    }
}
