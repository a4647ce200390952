//! Plugin Runtime Integration Tests
//!
//! Discovery across the dev and user roots, action aggregation, namespaced
//! execution and module reloads, driven through `PluginRuntime`.

#![cfg(unix)]

use serde_json::json;

use beacon_core::{PluginStatus, Provenance};
use beacon_desktop::utils::error::AppError;

use crate::common::{run_action, write_broken_plugin, write_plugin, Harness};

// ============================================================================
// Discovery
// ============================================================================

#[tokio::test]
async fn test_echo_plugin_beside_broken_plugin() {
    let harness = Harness::new();
    write_plugin(&harness.dev_root, "echo", &run_action("Echo"));
    write_broken_plugin(&harness.dev_root, "broken");

    let dev = harness.runtime.dev_source();
    let candidates = dev.list_candidates();
    assert_eq!(candidates.len(), 2);
    assert!(candidates.iter().any(|c| !c.validation.is_valid));

    let plugins = dev.get_all_plugins().await;
    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins[0].id, "echo");
    assert_eq!(plugins[0].provenance, Provenance::Dev);

    let actions = harness.runtime.actions().get_actions("").await;
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].id, "echo:run");
    assert_eq!(actions[0].plugin_id, "echo");

    let result = harness
        .runtime
        .actions()
        .execute_action("echo:run", "hello")
        .await
        .unwrap();
    assert_eq!(
        result,
        json!({ "plugin": "echo", "action": "run", "keyword": "hello" })
    );
}

#[tokio::test]
async fn test_valid_and_invalid_counts() {
    let harness = Harness::new();
    for name in ["alpha", "Bravo", "charlie"] {
        write_plugin(&harness.user_root, name, &run_action(name));
    }
    write_broken_plugin(&harness.user_root, "bad-json");
    std::fs::create_dir_all(harness.user_root.join("no-manifest")).unwrap();

    let user = harness.runtime.user_source();
    assert_eq!(user.list_candidates().len(), 5);

    let names: Vec<String> = user
        .get_all_plugins()
        .await
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["alpha", "Bravo", "charlie"]);
}

#[tokio::test]
async fn test_missing_roots_are_empty() {
    let harness = Harness::new();
    std::fs::remove_dir_all(&harness.dev_root).unwrap();

    assert!(harness.runtime.dev_source().get_all_plugins().await.is_empty());
    assert!(harness.runtime.actions().get_actions("").await.is_empty());
}

// ============================================================================
// Aggregation
// ============================================================================

#[tokio::test]
async fn test_same_local_id_is_namespaced() {
    let harness = Harness::new();
    write_plugin(&harness.dev_root, "first", &run_action("First"));
    write_plugin(&harness.user_root, "second", &run_action("Second"));

    let actions = harness.runtime.actions().get_actions("").await;
    let ids: Vec<&str> = actions.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["first:run", "second:run"]);

    let first = harness
        .runtime
        .actions()
        .execute_action("first:run", "")
        .await
        .unwrap();
    let second = harness
        .runtime
        .actions()
        .execute_action("second:run", "")
        .await
        .unwrap();
    assert_eq!(first["plugin"], "first");
    assert_eq!(second["plugin"], "second");
}

#[tokio::test]
async fn test_keyword_filter() {
    let harness = Harness::new();
    write_plugin(&harness.dev_root, "weather", &run_action("Forecast"));
    write_plugin(&harness.dev_root, "calc", &run_action("Calculator"));

    let actions = harness.runtime.actions().get_actions("FORE").await;
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].id, "weather:run");

    // Description matches too.
    let actions = harness.runtime.actions().get_actions("runs calc").await;
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].id, "calc:run");

    assert!(harness.runtime.actions().get_actions("nothing").await.is_empty());
}

#[tokio::test]
async fn test_dev_plugin_shadows_user_plugin() {
    let harness = Harness::new();
    write_plugin(&harness.dev_root, "echo", &run_action("Dev Echo"));
    write_plugin(&harness.user_root, "echo", &run_action("User Echo"));

    let actions = harness.runtime.actions().get_actions("").await;
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].title, "Dev Echo");

    // Both sources still list their copy.
    assert_eq!(harness.runtime.dev_source().get_all_plugins().await.len(), 1);
    assert_eq!(harness.runtime.user_source().get_all_plugins().await.len(), 1);
}

#[tokio::test]
async fn test_failing_plugin_is_omitted() {
    let harness = Harness::new();
    write_plugin(&harness.dev_root, "good", &run_action("Good"));
    let crashing = write_plugin(&harness.dev_root, "crashing", &run_action("Crashing"));
    std::fs::write(crashing.join("main.sh"), "exit 3\n").unwrap();

    let actions = harness.runtime.actions().get_actions("").await;
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].id, "good:run");

    let err = harness
        .runtime
        .actions()
        .execute_action("crashing:run", "")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ModuleLoad(_)), "unexpected error: {}", err);
}

// ============================================================================
// Reload
// ============================================================================

#[tokio::test]
async fn test_reload_picks_up_edits() {
    let harness = Harness::new();
    write_plugin(&harness.dev_root, "echo", &run_action("Before"));

    let actions = harness.runtime.actions().get_actions("").await;
    assert_eq!(actions[0].title, "Before");

    let plugins = harness.runtime.dev_source().get_all_plugins().await;
    assert_eq!(plugins[0].status, PluginStatus::Loaded);

    write_plugin(&harness.dev_root, "echo", &run_action("After"));

    // The cached module keeps serving until the plugin is reloaded.
    assert_eq!(harness.runtime.actions().get_actions("").await[0].title, "Before");

    let entity = harness.runtime.actions().reload_plugin("echo").await.unwrap();
    assert_eq!(entity.status, PluginStatus::Loaded);
    assert_eq!(harness.runtime.actions().get_actions("").await[0].title, "After");
}

#[tokio::test]
async fn test_unknown_action_ids() {
    let harness = Harness::new();
    write_plugin(&harness.dev_root, "echo", &run_action("Echo"));

    let actions = harness.runtime.actions();
    assert!(actions.execute_action("missing:run", "").await.is_err());
    assert!(actions.execute_action("no-separator", "").await.is_err());
    assert!(actions.get_action_view("echo:run").await.is_err());
}
