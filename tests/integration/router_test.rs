//! Router Integration Tests
//!
//! The full channel table over a runtime with recording surfaces.

use serde_json::{json, Value};

use beacon_desktop::commands::plugins::build_router;
use beacon_desktop::models::response::CommandResponse;

use crate::common::Harness;

#[tokio::test]
async fn test_envelope_shapes() {
    let harness = Harness::new();
    let router = build_router(harness.runtime.clone()).unwrap();

    let actions = router.dispatch("get-actions", Value::Null).await;
    assert_eq!(
        serde_json::to_value(&actions).unwrap(),
        json!({ "success": true, "data": [] })
    );

    let unknown = router.dispatch("launch-rockets", Value::Null).await;
    let unknown = serde_json::to_value(&unknown).unwrap();
    assert_eq!(unknown["success"], false);
    assert!(unknown["error"].as_str().unwrap().contains("launch-rockets"));

    let bad = router.dispatch("execute-action", json!({ "keyword": "x" })).await;
    assert!(bad.error().unwrap().contains("execute-action"));

    let missing = router
        .dispatch("execute-action", json!({ "actionId": "ghost:run" }))
        .await;
    assert!(!missing.is_ok());
}

#[tokio::test]
async fn test_view_show_after_destroy() {
    let harness = Harness::new();
    let router = build_router(harness.runtime.clone()).unwrap();

    let created = router
        .dispatch(
            "create-view",
            json!({ "viewId": "v1", "url": "https://plugins.test/ui", "actionId": "echo:run" }),
        )
        .await;
    assert_eq!(created, CommandResponse::Ok(json!("v1")));

    let views = router.dispatch("list-views", Value::Null).await;
    assert_eq!(views.data().unwrap()[0]["owning_action"], "echo:run");

    assert!(router.dispatch("destroy-view", json!({ "viewId": "v1" })).await.is_ok());

    let bounds = json!({ "x": 0, "y": 0, "width": 320, "height": 240 });
    let shown = router
        .dispatch("show-view", json!({ "viewId": "v1", "bounds": bounds }))
        .await;
    assert_eq!(shown, CommandResponse::Ok(json!(true)));

    let toggled = router.dispatch("toggle-devtools", json!({ "viewId": "v1" })).await;
    assert_eq!(toggled, CommandResponse::Ok(json!(false)));

    assert_eq!(
        harness.surfaces.events(),
        vec![
            "create v1",
            "navigate v1 https://plugins.test/ui",
            "destroy v1",
        ]
    );
    assert_eq!(
        router.dispatch("list-views", Value::Null).await,
        CommandResponse::Ok(json!([]))
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_action_view_round_trip_through_channels() {
    let harness = Harness::new();
    let actions = r#"[{"id":"open","title":"Open Panel","view":"ui/index.html","viewMode":"own-surface"}]"#;
    let dir = crate::common::write_plugin(&harness.dev_root, "panel", actions);
    std::fs::create_dir_all(dir.join("ui")).unwrap();
    std::fs::write(dir.join("ui").join("index.html"), "<html></html>").unwrap();

    let router = build_router(harness.runtime.clone()).unwrap();

    let listed = router.dispatch("get-actions", json!({ "keyword": "panel" })).await;
    assert_eq!(listed.data().unwrap()[0]["id"], "panel:open");

    let view = router
        .dispatch("get-action-view", json!({ "actionId": "panel:open" }))
        .await;
    let view = view.data().unwrap().clone();
    let path = view["view_path"].as_str().unwrap().to_string();
    assert!(path.ends_with("index.html"));

    let created = router
        .dispatch("create-view", json!({ "url": path, "actionId": "panel:open" }))
        .await;
    let view_id = created.data().unwrap().as_str().unwrap().to_string();
    assert!(!view_id.is_empty());
    assert!(harness
        .surfaces
        .events()
        .contains(&format!("navigate {} {}", view_id, path)));
}

#[tokio::test]
async fn test_plugin_listing_channels() {
    let harness = Harness::new();
    let router = build_router(harness.runtime.clone()).unwrap();

    for channel in ["get-dev-plugins", "get-user-plugins", "get-remote-plugins"] {
        assert_eq!(
            router.dispatch(channel, Value::Null).await,
            CommandResponse::Ok(json!([])),
            "channel {}",
            channel
        );
    }

    assert!(router.dispatch("get-dev-plugins", json!({})).await.is_ok());

    let root = router.dispatch("get-plugin-root-directory", Value::Null).await;
    assert_eq!(
        root.data().unwrap().as_str().unwrap(),
        harness.user_root.to_string_lossy()
    );

    let uninstall = router
        .dispatch("uninstall-plugin", json!({ "pluginId": "absent" }))
        .await;
    assert!(uninstall.error().unwrap().contains("absent"));
}
