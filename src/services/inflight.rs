//! In-process coalescing of concurrent misses on the same key.
//!
//! Tasks in one process that miss on the same key queue on a local mutex
//! before contending for the distributed lock, so a hot key costs one lock
//! round-trip per process instead of one per task. Correctness never
//! depends on it; the distributed lock still guards every load.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct InFlightRegistry {
    slots: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a holder or waiters.
    pub fn active(&self) -> usize {
        self.slots.len()
    }

    /// Wait at most `wait` to become the in-process owner of `key`.
    ///
    /// Returns `None` on timeout; the caller carries on without the fast path.
    pub async fn enter(&self, key: &str, wait: Duration) -> Option<InFlightGuard> {
        let slot = Arc::clone(
            self.slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );

        let entered = tokio::time::timeout(wait, slot.lock_owned()).await.ok();
        let guard = InFlightGuard {
            key: key.to_string(),
            slots: Arc::clone(&self.slots),
            guard: entered,
        };
        if guard.guard.is_some() {
            Some(guard)
        } else {
            // Dropping the guard prunes the slot if nobody else is queued.
            None
        }
    }
}

/// Held while this task owns the in-process slot for a key.
pub struct InFlightGuard {
    key: String,
    slots: Arc<DashMap<String, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The map holds one reference; anything above that is a queued task.
        self.slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_entrant_waits_for_first() {
        let registry = InFlightRegistry::new();
        let first = registry
            .enter("product:1", Duration::from_millis(10))
            .await
            .unwrap();

        assert!(registry
            .enter("product:1", Duration::from_millis(20))
            .await
            .is_none());
        assert!(registry
            .enter("product:2", Duration::from_millis(20))
            .await
            .is_some());

        drop(first);
        assert!(registry
            .enter("product:1", Duration::from_millis(20))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_slots_are_pruned() {
        let registry = InFlightRegistry::new();
        {
            let _guard = registry.enter("product:1", Duration::ZERO).await.unwrap();
            assert_eq!(registry.active(), 1);
        }
        assert_eq!(registry.active(), 0);
    }

    #[tokio::test]
    async fn test_queued_waiter_keeps_slot_alive() {
        let registry = InFlightRegistry::new();
        let first = registry.enter("k", Duration::ZERO).await.unwrap();

        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .enter("k", Duration::from_secs(1))
                    .await
                    .is_some()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(first);

        assert!(waiter.await.unwrap());
        assert_eq!(registry.active(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_pin_slot() {
        let registry = InFlightRegistry::new();
        let first = registry.enter("k", Duration::ZERO).await.unwrap();

        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.enter("k", Duration::from_secs(5)).await.is_some() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());

        drop(first);
        assert_eq!(registry.active(), 0);
        assert!(registry.enter("k", Duration::ZERO).await.is_some());
    }
}
