use cacheward::adapters::memory::InMemoryCacheStore;
use cacheward::domain::errors::LockError;
use cacheward::services::DistributedLockManager;
use futures::future::join_all;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn manager(store: &InMemoryCacheStore) -> DistributedLockManager {
    DistributedLockManager::new(Arc::new(store.clone()))
        .with_poll_interval(Duration::from_millis(1), Duration::from_millis(5))
}

/// Run `contenders` tasks through the same lock and report the peak number of holders.
async fn peak_holders(contenders: usize, hold: Duration) -> usize {
    let store = InMemoryCacheStore::new();
    let locks = manager(&store);
    let inside = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks = (0..contenders).map(|_| {
        let locks = locks.clone();
        let inside = Arc::clone(&inside);
        let peak = Arc::clone(&peak);
        tokio::spawn(async move {
            let guard = locks
                .acquire_guard("load:product:1", Duration::from_secs(5), Duration::from_secs(10))
                .await
                .unwrap();
            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(hold).await;
            inside.fetch_sub(1, Ordering::SeqCst);
            guard.release().await.unwrap();
        })
    });
    for joined in join_all(tasks).await {
        joined.unwrap();
    }
    peak.load(Ordering::SeqCst)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: however many tasks contend, at most one holds the lock at a time
    #[test]
    fn prop_lock_is_exclusive(contenders in 1usize..12, hold_ms in 0u64..5) {
        let peak = tokio_test::block_on(peak_holders(contenders, Duration::from_millis(hold_ms)));
        prop_assert_eq!(peak, 1);
    }
}

#[tokio::test]
async fn test_expired_lease_can_be_taken_over() {
    let store = InMemoryCacheStore::new();
    let locks = manager(&store);

    let first = locks
        .acquire("load:product:2", Duration::from_millis(20), Duration::ZERO)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;

    let second = locks
        .acquire("load:product:2", Duration::from_secs(5), Duration::ZERO)
        .await
        .unwrap();
    assert_ne!(first.owner, second.owner);

    // The first owner's late release must not free the lock it no longer holds.
    assert!(matches!(
        locks.release("load:product:2", first.owner).await,
        Err(LockError::NotOwner(_))
    ));
    locks.release("load:product:2", second.owner).await.unwrap();
}
