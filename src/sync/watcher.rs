//! Filesystem change watcher with debounce
//!
//! A `notify` watcher runs on its own thread and forwards relevant events to
//! an async debounce loop, which turns each burst of changes into a single
//! cycle request.

use super::trigger::CycleTrigger;
use crate::model::DocumentKind;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::pin::Pin;
use std::sync::mpsc as std_mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long the watcher thread blocks before checking for shutdown
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Whether an event touches a live marker or player document
pub fn is_relevant(event: &Event) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event.paths.iter().any(|path| is_live_document(path))
}

fn is_live_document(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    [DocumentKind::Markers, DocumentKind::Players]
        .iter()
        .any(|kind| kind.file_name() == name)
}

/// Start watching `root`; returns the debounce task
///
/// The watch is established before this returns, so a root that cannot be
/// watched is an error here rather than a dead watcher later. The task exits
/// when `shutdown` is cancelled, or early if the watcher stops delivering
/// events. The watcher thread notices cancellation within one poll interval.
pub fn spawn(
    root: &Path,
    debounce: Duration,
    trigger: Arc<CycleTrigger>,
    shutdown: CancellationToken,
) -> notify::Result<JoinHandle<()>> {
    let (watch_tx, watch_rx) = std_mpsc::channel();
    let mut watcher = RecommendedWatcher::new(watch_tx, NotifyConfig::default())?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    info!(root = %root.display(), "watching for document changes");

    let (tx, rx) = mpsc::unbounded_channel();
    let thread_shutdown = shutdown.clone();
    std::thread::spawn(move || forward_events(watcher, watch_rx, tx, thread_shutdown));
    Ok(tokio::spawn(debounce_loop(rx, debounce, trigger, shutdown)))
}

/// Pump relevant events to the debounce loop; owns the watcher so it lives
/// exactly as long as this thread
fn forward_events(
    _watcher: RecommendedWatcher,
    watch_rx: std_mpsc::Receiver<notify::Result<Event>>,
    tx: mpsc::UnboundedSender<()>,
    shutdown: CancellationToken,
) {
    loop {
        if shutdown.is_cancelled() {
            break;
        }
        match watch_rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(event)) => {
                if !is_relevant(&event) {
                    continue;
                }
                debug!(kind = ?event.kind, paths = ?event.paths, "document changed");
                if tx.send(()).is_err() {
                    break;
                }
            }
            Ok(Err(e)) => warn!(error = %e, "watch error"),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                error!("change watcher disconnected");
                break;
            }
        }
    }
}

/// Coalesce change notifications into cycle requests
///
/// The first notification arms a timer of length `debounce`; notifications
/// arriving before it fires are absorbed. When it fires, one cycle is
/// requested.
pub async fn debounce_loop(
    mut rx: mpsc::UnboundedReceiver<()>,
    debounce: Duration,
    trigger: Arc<CycleTrigger>,
    shutdown: CancellationToken,
) {
    let mut flush_timer: Option<Pin<Box<Sleep>>> = None;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            maybe = rx.recv() => {
                if maybe.is_none() {
                    break;
                }
                if flush_timer.is_none() {
                    flush_timer = Some(Box::pin(sleep(debounce)));
                }
            }
            _ = async {
                if let Some(timer) = &mut flush_timer {
                    timer.await;
                }
            }, if flush_timer.is_some() => {
                flush_timer = None;
                debug!("change burst settled, requesting cycle");
                trigger.request();
            }
        }
    }
}
