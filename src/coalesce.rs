//! Request Coalescing
//!
//! Collapses concurrent calls for the same key into a single execution.
//!
//! # Design
//!
//! ```text
//! caller A ──┐                    ┌── first caller: spawns the operation
//! caller B ──┼── calls[key]? ─────┤
//! caller C ──┘                    └── every caller: awaits the shared channel
//! ```
//!
//! The first caller for a key registers a shared channel and spawns the
//! operation onto the runtime. Every caller, the first one included, only
//! waits on that channel, so dropping any of them (a timeout, an aborted
//! task, a disconnected HTTP client) never cancels the work the others are
//! waiting for. The spawned task removes the record before publishing the
//! result; a later call starts a fresh cycle. This is deduplication of
//! overlapping work, not a cache.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

type CallChannel<T> = Shared<oneshot::Receiver<Result<T>>>;
type CallMap<T> = Arc<Mutex<HashMap<String, CallChannel<T>>>>;

/// Deduplicates concurrent operations by key.
pub struct Coalescer<T> {
    calls: CallMap<T>,
}

/// Removes the call record when the spawned operation finishes or unwinds.
struct CallGuard<T> {
    calls: CallMap<T>,
    key: String,
}

impl<T> Drop for CallGuard<T> {
    fn drop(&mut self) {
        self.calls.lock().remove(&self.key);
    }
}

impl<T> Coalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty coalescer
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run `operation` for `key` unless a call for `key` is already in flight,
    /// in which case wait for that call and return its result.
    ///
    /// The operation runs on its own task and completes even if every caller
    /// stops waiting. Must be called from within a tokio runtime. Callers get
    /// [`Error::CallAbandoned`] only if that task dies without a result
    /// (a panic, or the runtime shutting down).
    pub async fn run<F, Fut>(&self, key: &str, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (channel, leader) = {
            let mut calls = self.calls.lock();
            match calls.get(key) {
                Some(channel) => (channel.clone(), None),
                None => {
                    let (sender, receiver) = oneshot::channel();
                    let channel = receiver.shared();
                    calls.insert(key.to_string(), channel.clone());
                    (channel, Some(sender))
                }
            }
        };

        match leader {
            Some(sender) => {
                let guard = CallGuard {
                    calls: Arc::clone(&self.calls),
                    key: key.to_string(),
                };
                let future = operation();
                tokio::spawn(async move {
                    let result = future.await;
                    drop(guard);
                    // Every caller may be gone already.
                    let _ = sender.send(result);
                });
            }
            None => debug!(key, "waiting on in-flight call"),
        }

        match channel.await {
            Ok(result) => result,
            Err(oneshot::Canceled) => Err(Error::CallAbandoned(key.to_string())),
        }
    }

    /// Number of keys with a call in flight
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

impl<T> Default for Coalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Coalescer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coalescer")
            .field("in_flight", &self.calls.lock().len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_single_call() {
        let coalescer = Coalescer::new();
        let value = coalescer.run("key", || async { Ok("bar".to_string()) }).await;
        assert_eq!(value.unwrap(), "bar");
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_error_is_returned() {
        let coalescer: Coalescer<String> = Coalescer::new();
        let result = coalescer
            .run("key", || async { Err(Error::load("key", "boom")) })
            .await;
        assert_matches!(result, Err(Error::Load { .. }));
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_calls_run_once() {
        let coalescer = Coalescer::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let results = join_all((0..50).map(|_| {
            let calls = Arc::clone(&calls);
            coalescer.run("K", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok("bar".to_string())
            })
        }))
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 50);
        for result in results {
            assert_eq!(result.unwrap(), "bar");
        }
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_followers_share_leader_error() {
        let coalescer: Coalescer<u32> = Coalescer::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let results = join_all((0..10).map(|_| {
            let calls = Arc::clone(&calls);
            coalescer.run("K", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err(Error::load("K", "source down"))
            })
        }))
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_matches!(result, Err(Error::Load { ref key, .. }) if key == "K");
        }
    }

    #[tokio::test]
    async fn test_sequential_calls_start_fresh() {
        let coalescer = Coalescer::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for expected in 1..=3 {
            let calls = Arc::clone(&calls);
            let value = coalescer
                .run("K", move || async move { Ok(calls.fetch_add(1, Ordering::SeqCst) + 1) })
                .await
                .unwrap();
            assert_eq!(value, expected);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_coalesce() {
        let coalescer = Coalescer::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let results = join_all(["a", "b", "c"].into_iter().map(|key| {
            let calls = Arc::clone(&calls);
            coalescer.run(key, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(key.to_uppercase())
            })
        }))
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let values: Vec<String> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_timed_out_leader_does_not_cancel_followers() {
        let coalescer: Arc<Coalescer<String>> = Arc::new(Coalescer::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let operation = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok("slow".to_string())
            }
        };

        let leader = tokio::time::timeout(
            Duration::from_millis(50),
            coalescer.run("K", operation(Arc::clone(&calls))),
        );
        let follower = {
            let coalescer = Arc::clone(&coalescer);
            let calls = Arc::clone(&calls);
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                coalescer.run("K", operation(calls)).await
            }
        };

        let (leader, follower) = tokio::join!(leader, follower);

        assert!(leader.is_err());
        assert_eq!(follower.unwrap(), "slow");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_operation_completes_after_every_caller_left() {
        let coalescer: Coalescer<String> = Coalescer::new();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            coalescer.run("K", || async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let _ = done_tx.send(());
                Ok("late".to_string())
            }),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(coalescer.in_flight(), 1);

        done_rx.await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_panicking_operation_abandons_callers() {
        let coalescer: Coalescer<String> = Coalescer::new();

        let result = coalescer
            .run("K", || async {
                if true {
                    panic!("operation failed");
                }
                Ok("never".to_string())
            })
            .await;

        assert_matches!(result, Err(Error::CallAbandoned(ref key)) if key == "K");
        assert_eq!(coalescer.in_flight(), 0);
    }
}
