//! Cluster-wide mutual exclusion for lifecycle sweeps.
//!
//! Every replica runs its own scheduler; only the one that wins the advisory
//! lock for a tick actually sweeps. The lock lives in its own unit of work and
//! is released when that unit commits or rolls back, so a crashed replica
//! never leaves it behind.

use std::future::Future;
use std::sync::Arc;

use crate::db::{StoreError, StoreTx, TournamentStore};

/// Advisory lock key shared by every replica (ASCII "tourney\0")
pub const DEFAULT_LIFECYCLE_LOCK_KEY: i64 = 0x746f_7572_6e65_7900;

/// Result of attempting to run work under the lifecycle lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome<T> {
    /// This caller held the lock and the work ran
    Acquired(T),
    /// Another holder had the lock; nothing ran
    NotAcquired,
}

impl<T> LockOutcome<T> {
    pub fn is_acquired(&self) -> bool {
        matches!(self, LockOutcome::Acquired(_))
    }

    pub fn into_inner(self) -> Option<T> {
        match self {
            LockOutcome::Acquired(value) => Some(value),
            LockOutcome::NotAcquired => None,
        }
    }
}

/// Runs work under a store-backed advisory lock
pub struct LockCoordinator<S: TournamentStore> {
    store: Arc<S>,
    key: i64,
}

impl<S: TournamentStore> Clone for LockCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key,
        }
    }
}

impl<S: TournamentStore> LockCoordinator<S> {
    pub fn new(store: Arc<S>, key: i64) -> Self {
        Self { store, key }
    }

    pub fn key(&self) -> i64 {
        self.key
    }

    /// Run `work` only if the lifecycle lock can be taken right now.
    ///
    /// Never waits for the lock. On success the lock's unit of work is
    /// committed after `work` returns `Ok`; on error it is rolled back and the
    /// error is returned. Either way the lock is released before this returns.
    pub async fn with_exclusive_lifecycle_lock<F, Fut, T, E>(&self, work: F) -> Result<LockOutcome<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<StoreError>,
    {
        let mut tx = self.store.begin().await?;

        if !tx.try_advisory_lock(self.key).await? {
            return Ok(LockOutcome::NotAcquired);
        }

        match work().await {
            Ok(value) => {
                tx.commit().await?;
                Ok(LockOutcome::Acquired(value))
            }
            Err(e) => {
                drop(tx);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Barrier;

    #[tokio::test]
    async fn test_runs_work_when_free() {
        let store = Arc::new(MemoryStore::new());
        let lock = LockCoordinator::new(Arc::clone(&store), 11);

        let outcome = lock
            .with_exclusive_lifecycle_lock(|| async { Ok::<_, StoreError>(5) })
            .await
            .unwrap();

        assert_eq!(outcome, LockOutcome::Acquired(5));
        assert!(!store.is_advisory_locked(11));
    }

    #[tokio::test]
    async fn test_error_releases_lock() {
        let store = Arc::new(MemoryStore::new());
        let lock = LockCoordinator::new(Arc::clone(&store), 11);

        let result: Result<LockOutcome<()>, StoreError> = lock
            .with_exclusive_lifecycle_lock(|| async {
                Err(StoreError::Corrupt("boom".to_string()))
            })
            .await;

        assert!(matches!(result, Err(StoreError::Corrupt(_))));
        assert!(!store.is_advisory_locked(11));
    }

    #[tokio::test]
    async fn test_only_one_replica_runs_at_a_time() {
        let store = Arc::new(MemoryStore::new());
        let replicas = 5;
        let barrier = Arc::new(Barrier::new(replicas));
        let running = Arc::new(AtomicUsize::new(0));
        let ran = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..replicas {
            let lock = LockCoordinator::new(Arc::clone(&store), DEFAULT_LIFECYCLE_LOCK_KEY);
            let barrier = Arc::clone(&barrier);
            let running = Arc::clone(&running);
            let ran = Arc::clone(&ran);

            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                lock.with_exclusive_lifecycle_lock(|| async {
                    assert_eq!(running.fetch_add(1, Ordering::SeqCst), 0);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    ran.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, StoreError>(())
                })
                .await
                .unwrap()
            }));
        }

        let mut acquired = 0;
        for handle in handles {
            if handle.await.unwrap().is_acquired() {
                acquired += 1;
            }
        }

        // the winner holds the lock well past every other attempt
        assert_eq!(acquired, 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(!store.is_advisory_locked(DEFAULT_LIFECYCLE_LOCK_KEY));
    }
}
