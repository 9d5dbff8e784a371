//! Single-flight credential refresh.
//!
//! At most one refresh operation exists at a time. The first caller creates it,
//! later callers attach to the same shared future, and the operation removes
//! itself from the slot once its work (including the credential write) is done.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, warn};

type RefreshOutcome = Shared<BoxFuture<'static, Option<String>>>;

struct InFlight {
    id: u64,
    outcome: RefreshOutcome,
}

#[derive(Default)]
struct Slot {
    current: Mutex<Option<InFlight>>,
    next_id: AtomicU64,
}

impl Slot {
    /// Evict the operation `id`, leaving any newer one in place.
    fn settle(&self, id: u64) {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|in_flight| in_flight.id == id) {
            *current = None;
            debug!(id, "Refresh settled");
        }
    }
}

#[derive(Clone, Default)]
pub struct RefreshCoordinator {
    slot: Arc<Slot>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Obtain a fresh token, sharing any refresh already in progress.
    ///
    /// `start` is only invoked when no operation is in flight. Its future runs
    /// on its own task, so it completes even if every waiter is dropped.
    pub async fn refresh<F>(&self, start: F) -> Option<String>
    where
        F: FnOnce() -> BoxFuture<'static, Option<String>>,
    {
        let outcome = {
            let mut current = self.slot.current.lock();
            match current.as_ref() {
                Some(in_flight) => {
                    debug!(id = in_flight.id, "Joining in-flight refresh");
                    in_flight.outcome.clone()
                }
                None => {
                    let id = self.slot.next_id.fetch_add(1, Ordering::Relaxed);
                    debug!(id, "Starting refresh");
                    let work = start();
                    let slot = Arc::clone(&self.slot);
                    let handle = tokio::spawn(async move {
                        let token = work.await;
                        slot.settle(id);
                        token
                    });
                    let outcome = async move {
                        match handle.await {
                            Ok(token) => token,
                            Err(e) => {
                                warn!(error = %e, "Refresh task failed");
                                None
                            }
                        }
                    }
                    .boxed()
                    .shared();
                    *current = Some(InFlight {
                        id,
                        outcome: outcome.clone(),
                    });
                    outcome
                }
            }
        };
        outcome.await
    }

    pub fn is_in_flight(&self) -> bool {
        self.slot.current.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    fn slow_refresh(calls: Arc<AtomicUsize>, token: Option<&'static str>) -> BoxFuture<'static, Option<String>> {
        calls.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.map(str::to_string)
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let waiters = (0..5).map(|_| {
            let calls = Arc::clone(&calls);
            let coordinator = coordinator.clone();
            async move { coordinator.refresh(|| slow_refresh(calls, Some("token2"))).await }
        });
        let results = futures::future::join_all(waiters).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.as_deref() == Some("token2")));
    }

    #[tokio::test]
    async fn test_failure_is_shared_as_none() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let waiters = (0..3).map(|_| {
            let calls = Arc::clone(&calls);
            let coordinator = coordinator.clone();
            async move { coordinator.refresh(|| slow_refresh(calls, None)).await }
        });
        let results = futures::future::join_all(waiters).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(Option::is_none));
    }

    #[tokio::test]
    async fn test_settled_refresh_is_evicted() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = coordinator
            .refresh(|| slow_refresh(Arc::clone(&calls), Some("token2")))
            .await;
        assert_eq!(first.as_deref(), Some("token2"));
        assert!(!coordinator.is_in_flight());

        let second = coordinator
            .refresh(|| slow_refresh(Arc::clone(&calls), Some("token3")))
            .await;
        assert_eq!(second.as_deref(), Some("token3"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_work_survives_dropped_waiter() {
        let coordinator = RefreshCoordinator::new();
        let finished = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&finished);
        let waited = tokio::time::timeout(
            Duration::from_millis(5),
            coordinator.refresh(move || {
                async move {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    flag.store(true, Ordering::SeqCst);
                    Some("token2".to_string())
                }
                .boxed()
            }),
        )
        .await;
        assert!(waited.is_err());
        assert!(coordinator.is_in_flight());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(finished.load(Ordering::SeqCst));
        assert!(!coordinator.is_in_flight());
    }
}
