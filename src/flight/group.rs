//! Single-Flight Group
//!
//! Collapses concurrent calls sharing a key into one execution.
//!
//! # Design
//!
//! - The first caller for a key spawns the work on its own task and records a
//!   shared handle to its result under the key
//! - Later callers for the same key await that handle instead of running again
//! - The spawned task removes the record before its result becomes visible, so
//!   a call arriving afterwards starts a fresh flight
//! - Dropping a waiting caller only detaches that caller; the spawned work
//!   keeps running for everybody else

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{KvError, Result};
use crate::kv::Key;

type Call<T> = Shared<BoxFuture<'static, Result<T>>>;
type Calls<K, T> = Arc<Mutex<HashMap<K, Call<T>>>>;

// == Group ==
/// Key-addressed deduplication of in-flight work.
pub struct Group<K, T> {
    calls: Calls<K, T>,
}

impl<K: Key, T: Clone + Send + Sync + 'static> Group<K, T> {
    /// Creates a group with nothing in flight.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    // == Work ==
    /// Runs `f` for `key` unless a call for `key` is already in flight, in
    /// which case that call's result is awaited instead.
    ///
    /// Returns the result and whether it was shared with another caller
    /// (true for every joiner, false for the caller that started the flight).
    ///
    /// `f` is called without the group's lock held, so it may use the group
    /// itself. If another caller starts a flight for `key` while `f` runs,
    /// the future `f` returned is dropped without being polled and this
    /// caller joins the other flight.
    pub async fn work<F, Fut>(&self, key: &K, f: F) -> (Result<T>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let joined = self.calls.lock().get(key).cloned();
        let (call, shared) = match joined {
            Some(call) => (call, true),
            None => {
                let fut = f();
                let mut calls = self.calls.lock();
                match calls.get(key).cloned() {
                    Some(call) => (call, true),
                    None => {
                        let call = self.launch(key.clone(), fut);
                        calls.insert(key.clone(), call.clone());
                        (call, false)
                    }
                }
            }
        };

        if shared {
            debug!("Joined in-flight call");
        }
        (call.await, shared)
    }

    /// Number of keys with a call currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    fn launch<Fut>(&self, key: K, fut: Fut) -> Call<T>
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let guard = Landing {
            calls: Arc::clone(&self.calls),
            key,
        };
        let handle = tokio::spawn(async move {
            let _guard = guard;
            fut.await
        });

        async move {
            handle.await.unwrap_or_else(|err| {
                Err(KvError::backend(format!("in-flight call did not complete: {err}")))
            })
        }
        .boxed()
        .shared()
    }
}

impl<K: Key, T: Clone + Send + Sync + 'static> Default for Group<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> fmt::Debug for Group<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("in_flight", &self.calls.lock().len())
            .finish()
    }
}

/// Removes a flight's record when the spawned work ends, however it ends.
struct Landing<K: Key, T> {
    calls: Calls<K, T>,
    key: K,
}

impl<K: Key, T> Drop for Landing<K, T> {
    fn drop(&mut self) {
        self.calls.lock().remove(&self.key);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::Barrier;

    #[tokio::test]
    async fn test_single_caller_runs_once() {
        let group: Group<&str, u32> = Group::new();

        let (result, shared) = group.work(&"k", || async { Ok(7) }).await;

        assert_eq!(result.unwrap(), 7);
        assert!(!shared);
        assert_eq!(group.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_execution() {
        let group: Arc<Group<&str, u32>> = Arc::new(Group::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let callers = 16;
        let barrier = Arc::new(Barrier::new(callers));

        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let group = Arc::clone(&group);
                let runs = Arc::clone(&runs);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    group
                        .work(&"k", move || async move {
                            runs.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            Ok(42)
                        })
                        .await
                })
            })
            .collect();

        let mut shared_count = 0;
        for handle in handles {
            let (result, shared) = handle.await.unwrap();
            assert_eq!(result.unwrap(), 42);
            shared_count += shared as usize;
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(shared_count, callers - 1);
        assert_eq!(group.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_errors_are_shared_too() {
        let group: Arc<Group<u8, u8>> = Arc::new(Group::new());

        let slow = {
            let group = Arc::clone(&group);
            tokio::spawn(async move {
                group
                    .work(&1, || async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(KvError::backend("source down"))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let (joined, shared) = group.work(&1, || async { Ok(9) }).await;

        let (first, _) = slow.await.unwrap();
        assert!(shared);
        assert_eq!(first.unwrap_err().to_string(), "backend failure: source down");
        assert_eq!(joined.unwrap_err().to_string(), "backend failure: source down");
    }

    #[tokio::test]
    async fn test_different_keys_run_independently() {
        let group: Group<u8, u8> = Group::new();
        let runs = AtomicUsize::new(0);

        let (a, b) = tokio::join!(
            group.work(&1, || {
                runs.fetch_add(1, Ordering::SeqCst);
                async { Ok(1) }
            }),
            group.work(&2, || {
                runs.fetch_add(1, Ordering::SeqCst);
                async { Ok(2) }
            }),
        );

        assert_eq!(a.0.unwrap(), 1);
        assert_eq!(b.0.unwrap(), 2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_cancel_shared_work() {
        let group: Arc<Group<u8, u8>> = Arc::new(Group::new());
        let finished = Arc::new(AtomicUsize::new(0));

        let leader = {
            let group = Arc::clone(&group);
            let finished = Arc::clone(&finished);
            tokio::spawn(async move {
                group
                    .work(&1, move || async move {
                        tokio::time::sleep(Duration::from_millis(80)).await;
                        finished.fetch_add(1, Ordering::SeqCst);
                        Ok(5)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // The caller that started the flight goes away
        leader.abort();

        let (joined, shared) = group.work(&1, || async { Ok(0) }).await;
        assert!(shared);
        assert_eq!(joined.unwrap(), 5);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_later_call_starts_new_flight() {
        let group: Group<u8, u8> = Group::new();

        let (first, _) = group.work(&1, || async { Ok(1) }).await;
        let (second, shared) = group.work(&1, || async { Ok(2) }).await;

        assert_eq!(first.unwrap(), 1);
        assert_eq!(second.unwrap(), 2);
        assert!(!shared);
    }

    #[tokio::test]
    async fn test_work_closure_may_inspect_group() {
        let group: Group<u8, usize> = Group::new();

        let (result, shared) = group
            .work(&1, || {
                let busy = group.in_flight();
                async move { Ok(busy) }
            })
            .await;

        assert_eq!(result.unwrap(), 0);
        assert!(!shared);
    }

    #[tokio::test]
    async fn test_work_closure_may_start_nested_flight() {
        let group: Arc<Group<u8, u8>> = Arc::new(Group::new());

        let nested = Arc::clone(&group);
        let (result, shared) = group
            .work(&1, move || async move {
                let (inner, _) = nested.work(&2, || async { Ok(3) }).await;
                inner.map(|value| value + 1)
            })
            .await;

        assert_eq!(result.unwrap(), 4);
        assert!(!shared);
        assert_eq!(group.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_panicking_work_reports_backend_error() {
        let group: Group<u8, u8> = Group::new();

        let (result, _) = group
            .work(&1, || async {
                if true {
                    panic!("work exploded");
                }
                Ok(1)
            })
            .await;

        assert!(matches!(result, Err(KvError::Backend(_))));
        assert_eq!(group.in_flight(), 0);
    }
}
