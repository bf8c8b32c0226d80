//! Continuous synchronization
//!
//! [`run`] drives the engine: one cycle at startup, then one cycle per
//! settled burst of document changes, until shutdown.

mod engine;
mod lock;
mod trigger;
pub mod watcher;

pub use engine::{CycleReport, SyncEngine, SyncResult};
pub use lock::{DataLock, DataLockGuard, LOCK_FILE};
pub use trigger::CycleTrigger;

use crate::storage::StorageError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Change watcher failed: {0}")]
    Watch(#[from] notify::Error),

    #[error("Change watcher stopped unexpectedly")]
    WatcherStopped,

    #[error("Unknown dimension: {0}")]
    UnknownDimension(String),

    #[error("Marker not found: {0}")]
    MarkerNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Run cycles on the blocking pool whenever `trigger` fires
///
/// A cycle that has started always completes; cancellation is only observed
/// between cycles.
pub async fn run_cycles(
    engine: Arc<SyncEngine>,
    trigger: Arc<CycleTrigger>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = trigger.wait() => {
                let engine = engine.clone();
                match tokio::task::spawn_blocking(move || engine.run_cycle()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => error!(error = %e, "sync cycle could not start"),
                    Err(e) => error!(error = %e, "sync cycle panicked"),
                }
            }
        }
    }
}

/// Watch `data_root` and keep every dimension synchronized until `shutdown`
///
/// The data root is created if needed. Returns an error if it cannot be
/// watched, or if the watcher dies before `shutdown`; the cycle in flight
/// completes either way.
pub async fn run(
    engine: Arc<SyncEngine>,
    data_root: PathBuf,
    debounce: Duration,
    shutdown: CancellationToken,
) -> SyncResult<()> {
    std::fs::create_dir_all(&data_root).map_err(|source| StorageError::Io {
        path: data_root.clone(),
        source,
    })?;

    let stop = shutdown.child_token();
    let trigger = Arc::new(CycleTrigger::new());
    let mut watcher = watcher::spawn(&data_root, debounce, trigger.clone(), stop.clone())?;

    // Startup cycle; changes seen meanwhile queue one follow-up.
    trigger.request();
    let runner = tokio::spawn(run_cycles(engine, trigger, stop.clone()));

    let result = tokio::select! {
        biased;
        _ = stop.cancelled() => Ok(()),
        _ = &mut watcher => {
            if stop.is_cancelled() {
                Ok(())
            } else {
                error!(root = %data_root.display(), "change watcher stopped, shutting down");
                Err(SyncError::WatcherStopped)
            }
        }
    };
    stop.cancel();

    if let Err(e) = runner.await {
        error!(error = %e, "sync runner failed");
    }
    if !watcher.is_finished() {
        if let Err(e) = watcher.await {
            error!(error = %e, "change watcher task failed");
        }
    }
    info!("sync stopped");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::model::{Dimension, DocumentKind};
    use crate::storage::{DocumentStore, FileStore, RetryPolicy, StorageResult};
    use crate::IdAllocator;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(root: &Path) -> SyncConfig {
        SyncConfig {
            data_root: root.to_path_buf(),
            dimensions: vec![Dimension::from("world")],
            io_retry: RetryPolicy::none(),
            ..SyncConfig::default()
        }
    }

    fn engine(dir: &tempfile::TempDir) -> Arc<SyncEngine> {
        Arc::new(SyncEngine::open(&config(dir.path())).unwrap())
    }

    /// File store whose reads take a while, so a cycle can be caught in flight
    struct SlowStore {
        inner: FileStore,
        delay: Duration,
        reads: AtomicUsize,
    }

    impl DocumentStore for SlowStore {
        fn read_raw(&self, dimension: &Dimension, kind: DocumentKind) -> StorageResult<Option<Vec<u8>>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.inner.read_raw(dimension, kind)
        }

        fn write_raw(&self, dimension: &Dimension, kind: DocumentKind, contents: &str) -> StorageResult<()> {
            self.inner.write_raw(dimension, kind, contents)
        }

        fn document_path(&self, dimension: &Dimension, kind: DocumentKind) -> PathBuf {
            self.inner.document_path(dimension, kind)
        }
    }

    fn slow_engine(dir: &tempfile::TempDir) -> (Arc<SyncEngine>, Arc<SlowStore>) {
        let config = config(dir.path());
        let store = Arc::new(SlowStore {
            inner: FileStore::new(dir.path()).with_retry(RetryPolicy::none()),
            delay: Duration::from_millis(150),
            reads: AtomicUsize::new(0),
        });
        let allocator = IdAllocator::open(config.meta_path(), RetryPolicy::none()).unwrap();
        let engine = SyncEngine::new(store.clone(), allocator, config.dimensions, config.sea_level);
        (Arc::new(engine), store)
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn pending_requests_coalesce_into_one_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let trigger = Arc::new(CycleTrigger::new());
        let shutdown = CancellationToken::new();

        // Pile up requests before the runner ever waits.
        for _ in 0..4 {
            trigger.request();
        }
        let runner = tokio::spawn(run_cycles(engine.clone(), trigger.clone(), shutdown.clone()));

        wait_until(|| engine.cycles() >= 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(engine.cycles(), 1);

        shutdown.cancel();
        runner.await.unwrap();
    }

    #[tokio::test]
    async fn requests_during_a_cycle_queue_one_follow_up() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, store) = slow_engine(&dir);
        let trigger = Arc::new(CycleTrigger::new());
        let shutdown = CancellationToken::new();
        let runner = tokio::spawn(run_cycles(engine.clone(), trigger.clone(), shutdown.clone()));

        trigger.request();
        wait_until(|| store.reads.load(Ordering::SeqCst) >= 1).await;
        assert_eq!(engine.cycles(), 0);
        for _ in 0..5 {
            trigger.request();
        }

        wait_until(|| engine.cycles() >= 2).await;
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(engine.cycles(), 2);

        shutdown.cancel();
        runner.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_lets_the_running_cycle_finish() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, store) = slow_engine(&dir);
        let trigger = Arc::new(CycleTrigger::new());
        let shutdown = CancellationToken::new();
        let runner = tokio::spawn(run_cycles(engine.clone(), trigger.clone(), shutdown.clone()));

        trigger.request();
        wait_until(|| store.reads.load(Ordering::SeqCst) >= 1).await;
        trigger.request();
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(engine.cycles(), 1);
        assert!(dir.path().join("world/live/markers.json").exists());
        assert!(dir.path().join("world/live/players.json").exists());
    }

    #[tokio::test]
    async fn startup_cycle_runs_before_any_change() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run(
            engine.clone(),
            dir.path().to_path_buf(),
            Duration::from_millis(50),
            shutdown.clone(),
        ));

        wait_until(|| engine.cycles() >= 1).await;

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(dir.path().join("world/live/markers.json").exists());
    }

    #[tokio::test]
    async fn unusable_data_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let root = blocker.join("maps");
        let engine = engine(&dir);

        let result = run(engine.clone(), root, Duration::from_millis(50), CancellationToken::new()).await;
        assert!(matches!(result, Err(SyncError::Storage(StorageError::Io { .. }))));
        assert_eq!(engine.cycles(), 0);
    }
}
