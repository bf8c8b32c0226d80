//! Single-slot coalescing cycle trigger

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;

/// Requests for a merge cycle
///
/// At most one request is ever pending: any number of `request` calls made
/// while nobody is waiting collapse into a single wake-up. Requests made
/// while a cycle is running therefore produce exactly one follow-up cycle.
#[derive(Debug, Default)]
pub struct CycleTrigger {
    notify: Notify,
    requests: AtomicU64,
}

impl CycleTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
    }

    /// Wait until a cycle has been requested, consuming the request
    pub async fn wait(&self) {
        self.notify.notified().await;
    }

    /// Total number of `request` calls so far
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}
