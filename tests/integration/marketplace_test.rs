//! Marketplace Integration Tests
//!
//! Registry caching and the install/uninstall cycle against a fake registry.

use std::time::Duration;

use crate::common::{listing, plugin_tarball, run_action, CountingRegistry, Harness};

// ============================================================================
// Registry Cache
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_listings_cached_for_ttl() {
    let registry = CountingRegistry::default();
    registry.publish(listing("weather", "1.0.0"), Vec::new());
    let harness = Harness::with_registry(registry);
    let remote = harness.runtime.remote_source();

    assert_eq!(remote.get_packages().await.len(), 1);
    assert_eq!(remote.get_packages().await.len(), 1);
    assert_eq!(harness.registry.search_count(), 1);

    tokio::time::advance(remote.ttl() - Duration::from_secs(1)).await;
    remote.get_packages().await;
    assert_eq!(harness.registry.search_count(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    remote.get_packages().await;
    assert_eq!(harness.registry.search_count(), 2);
}

#[tokio::test]
async fn test_listings_without_allowed_keyword_are_dropped() {
    let registry = CountingRegistry::default();
    registry.publish(listing("weather", "1.0.0"), Vec::new());
    let mut foreign = listing("left-pad", "1.3.0");
    foreign.keywords = vec!["string".to_string()];
    registry.publish(foreign, Vec::new());
    let harness = Harness::with_registry(registry);

    let plugins = harness.runtime.remote_source().get_plugins().await;
    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins[0].id, "weather");
    assert!(!plugins[0].is_installed());
}

// ============================================================================
// Install / Uninstall
// ============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_install_run_uninstall() {
    let registry = CountingRegistry::default();
    registry.publish(
        listing("weather", "1.0.0"),
        plugin_tarball("weather", "1.0.0", &run_action("Forecast")),
    );
    let harness = Harness::with_registry(registry);
    let runtime = &harness.runtime;

    // Not installed: listed, but contributes no actions.
    assert!(runtime.actions().get_actions("").await.is_empty());

    let entity = runtime
        .market()
        .download_and_install_plugin("weather")
        .await
        .unwrap();
    assert_eq!(entity.id, "weather");
    assert!(harness.user_root.join("weather").join("package.json").is_file());
    assert!(runtime.user_source().has("weather").await);

    let remote = runtime.remote_source().get_plugins().await;
    assert!(remote[0].is_installed());

    // One action despite the plugin being visible to two sources.
    let actions = runtime.actions().get_actions("").await;
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].id, "weather:run");
    let result = runtime
        .actions()
        .execute_action("weather:run", "oslo")
        .await
        .unwrap();
    assert_eq!(result["keyword"], "oslo");

    runtime.market().uninstall_plugin("weather").await.unwrap();
    assert!(!harness.user_root.join("weather").exists());
    assert!(!runtime.user_source().has("weather").await);
    assert!(runtime.actions().get_actions("").await.is_empty());

    // No staging leftovers.
    let leftovers: Vec<_> = std::fs::read_dir(&harness.user_root).unwrap().collect();
    assert!(leftovers.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_reinstall_replaces_previous_version() {
    let registry = CountingRegistry::default();
    registry.publish(
        listing("weather", "2.0.0"),
        plugin_tarball("weather", "2.0.0", &run_action("Forecast")),
    );
    let harness = Harness::with_registry(registry);
    crate::common::write_plugin(&harness.user_root, "weather", &run_action("Old"));

    harness
        .runtime
        .market()
        .download_and_install_plugin("weather")
        .await
        .unwrap();

    let installed = harness.runtime.user_source().find("weather").await.unwrap();
    assert_eq!(installed.version, "2.0.0");
    assert_eq!(
        harness.runtime.actions().get_actions("").await[0].title,
        "Forecast"
    );
}

#[tokio::test]
async fn test_failed_install_leaves_user_root_untouched() {
    let registry = CountingRegistry::default();
    registry.publish(listing("corrupt", "1.0.0"), b"not a tarball".to_vec());
    let harness = Harness::with_registry(registry);

    let market = harness.runtime.market();
    assert!(market.download_and_install_plugin("corrupt").await.is_err());
    assert!(market.download_and_install_plugin("unlisted").await.is_err());

    let leftovers: Vec<_> = std::fs::read_dir(&harness.user_root).unwrap().collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_uninstall_missing_plugin_fails() {
    let harness = Harness::new();
    assert!(harness
        .runtime
        .market()
        .uninstall_plugin("nothing-here")
        .await
        .is_err());
    assert!(harness.runtime.market().uninstall_plugin("../escape").await.is_err());
}
