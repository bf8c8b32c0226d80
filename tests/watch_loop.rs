//! The watch loop against a real filesystem watcher

mod common;

use common::{MapFixture, NETHER, WORLD};
use livemark::DocumentKind;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn wait_for(what: &str, mut done: impl FnMut() -> bool) {
    let result = tokio::time::timeout(Duration::from_secs(10), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {what}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn external_edit_is_propagated() {
    let fx = MapFixture::with_dimensions(&[WORLD, NETHER]);
    let engine = Arc::new(fx.engine());
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(livemark::sync::run(
        engine.clone(),
        fx.root().to_path_buf(),
        Duration::from_millis(100),
        shutdown.clone(),
    ));

    wait_for("startup cycle", || engine.cycles() >= 1).await;
    // Let the startup writes settle and be absorbed before editing.
    tokio::time::sleep(Duration::from_millis(500)).await;

    fx.write_json(
        WORLD,
        DocumentKind::Markers,
        &json!({
            "shops": { "label": "Shops", "markers": {
                "marker_1": { "label": "Smithy", "position": { "x": 3.0, "y": 70.0, "z": 4.0 } }
            } }
        }),
    );

    wait_for("edit to reach the index", || engine.find_by_name("smithy").len() == 1).await;
    wait_for("category to spread", || {
        std::fs::read_to_string(fx.path(NETHER, DocumentKind::Markers))
            .map(|text| text.contains("\"shops\""))
            .unwrap_or(false)
    })
    .await;

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("shutdown in time")
        .expect("sync task")
        .expect("clean shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stable_data_settles_without_endless_cycles() {
    let fx = MapFixture::with_dimensions(&[WORLD, NETHER]);
    let engine = Arc::new(fx.engine());
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(livemark::sync::run(
        engine.clone(),
        fx.root().to_path_buf(),
        Duration::from_millis(50),
        shutdown.clone(),
    ));

    wait_for("startup cycle", || engine.cycles() >= 1).await;
    tokio::time::sleep(Duration::from_millis(800)).await;
    let settled = engine.cycles();
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(engine.cycles(), settled, "cycles kept running on unchanged data");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("shutdown in time")
        .expect("sync task")
        .expect("clean shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn data_root_created_at_startup_is_watched() {
    let fx = MapFixture::with_dimensions(&[WORLD, NETHER]);
    let root = fx.root().join("not_yet");
    let mut config = fx.config.clone();
    config.data_root = root.clone();
    let engine = Arc::new(livemark::SyncEngine::open(&config).expect("open engine"));
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(livemark::sync::run(
        engine.clone(),
        root.clone(),
        Duration::from_millis(100),
        shutdown.clone(),
    ));

    wait_for("startup cycle", || engine.cycles() >= 1).await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    let settled = engine.cycles();

    let markers = root.join(WORLD).join("live").join("markers.json");
    let text = serde_json::to_string_pretty(&json!({
        "shops": { "label": "Shops", "markers": {
            "marker_1": { "label": "Smithy", "position": { "x": 3.0, "y": 70.0, "z": 4.0 } }
        } }
    }))
    .unwrap();
    std::fs::write(&markers, text).unwrap();

    wait_for("edit to reach the index", || engine.find_by_name("smithy").len() == 1).await;
    assert!(engine.cycles() > settled);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("shutdown in time")
        .expect("sync task")
        .expect("clean shutdown");
}
