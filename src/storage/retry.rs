//! Bounded retry with exponential backoff for transient I/O failures

use super::traits::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::io::{self, ErrorKind};
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// How often, and how patiently, to retry a failing file operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub attempts: u32,
    /// Delay before the second attempt; doubles after each failure
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 50,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once
    pub fn none() -> Self {
        Self {
            attempts: 1,
            backoff_ms: 0,
        }
    }

    /// Run `op` against `path`, retrying transient failures
    pub fn run<T>(&self, path: &Path, mut op: impl FnMut() -> io::Result<T>) -> StorageResult<T> {
        let attempts = self.attempts.max(1);
        let mut delay = Duration::from_millis(self.backoff_ms);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(source) if !is_transient(&source) => {
                    return Err(StorageError::Io {
                        path: path.to_path_buf(),
                        source,
                    })
                }
                Err(source) if attempt >= attempts => {
                    return Err(StorageError::RetriesExhausted {
                        path: path.to_path_buf(),
                        attempts,
                        source,
                    })
                }
                Err(source) => {
                    debug!(
                        path = %path.display(),
                        attempt,
                        error = %source,
                        "transient I/O failure, retrying"
                    );
                    thread::sleep(delay);
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
            }
        }
    }
}

/// Failures that are expected to clear up on their own (locked files,
/// momentary permission flips on some platforms)
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::PermissionDenied
            | ErrorKind::WouldBlock
            | ErrorKind::Interrupted
            | ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            backoff_ms: 1,
        }
    }

    #[test]
    fn transient_failures_are_retried_until_success() {
        let calls = Cell::new(0);
        let result = fast(3).run(Path::new("x.json"), || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(io::Error::from(ErrorKind::PermissionDenied))
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn retries_are_bounded() {
        let calls = Cell::new(0);
        let result: StorageResult<()> = fast(2).run(Path::new("x.json"), || {
            calls.set(calls.get() + 1);
            Err(io::Error::from(ErrorKind::WouldBlock))
        });
        assert!(matches!(
            result,
            Err(StorageError::RetriesExhausted { attempts: 2, .. })
        ));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn permanent_failures_are_not_retried() {
        let calls = Cell::new(0);
        let result: StorageResult<()> = fast(5).run(Path::new("x.json"), || {
            calls.set(calls.get() + 1);
            Err(io::Error::from(ErrorKind::InvalidData))
        });
        assert!(matches!(result, Err(StorageError::Io { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let policy = RetryPolicy {
            attempts: 0,
            backoff_ms: 0,
        };
        assert_eq!(policy.run(Path::new("x"), || Ok(1)).unwrap(), 1);
    }
}
