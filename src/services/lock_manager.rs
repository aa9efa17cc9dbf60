//! Lease-based distributed locks over a shared cache store.
//!
//! Acquisition is one atomic `set_if_absent_with_ttl` of a fresh token under
//! the lock name, with the lease as TTL. Release is `compare_and_delete`
//! against that token, so a holder whose lease ran out can never delete a
//! lock someone else has since acquired. Lease expiry in the store is the
//! backstop when a holder dies.

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::domain::errors::LockError;
use crate::domain::models::{CacheConfig, Lock, LockToken};
use crate::domain::ports::CacheStore;

/// Distributed lock manager. Cheap to clone; clones share the store.
#[derive(Clone)]
pub struct DistributedLockManager {
    store: Arc<dyn CacheStore>,
    poll_initial: Duration,
    poll_max: Duration,
}

impl DistributedLockManager {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            poll_initial: Duration::from_millis(10),
            poll_max: Duration::from_millis(200),
        }
    }

    pub fn from_config(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self::new(store).with_poll_interval(config.lock_poll_initial(), config.lock_poll_max())
    }

    /// Bounds of the exponential backoff between acquisition attempts.
    #[must_use]
    pub fn with_poll_interval(mut self, initial: Duration, max: Duration) -> Self {
        self.poll_initial = initial.max(Duration::from_millis(1));
        self.poll_max = max.max(self.poll_initial);
        self
    }

    fn poll_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.poll_initial)
            .with_max_interval(self.poll_max)
            .with_multiplier(2.0)
            .with_randomization_factor(0.2)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Single acquisition attempt. `Ok(None)` when another owner holds the lock.
    pub async fn try_acquire(&self, name: &str, lease: Duration) -> Result<Option<Lock>, LockError> {
        let token = LockToken::generate();
        if self
            .store
            .set_if_absent_with_ttl(name, &token.to_bytes(), lease)
            .await?
        {
            debug!(lock = name, %token, ?lease, "lock acquired");
            Ok(Some(Lock::new(name, token, lease)))
        } else {
            Ok(None)
        }
    }

    /// Acquire `name`, polling with exponential backoff for at most `wait_bound`.
    pub async fn acquire(
        &self,
        name: &str,
        lease: Duration,
        wait_bound: Duration,
    ) -> Result<Lock, LockError> {
        let started = Instant::now();
        let deadline = started + wait_bound;
        let mut poll = self.poll_backoff();

        loop {
            if let Some(lock) = self.try_acquire(name, lease).await? {
                return Ok(lock);
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(lock = name, waited = ?(now - started), "lock wait timed out");
                return Err(LockError::Timeout {
                    name: name.to_string(),
                    waited: now - started,
                });
            }

            let delay = poll
                .next_backoff()
                .unwrap_or(self.poll_max)
                .min(deadline - now);
            sleep(delay).await;
        }
    }

    /// Release `name` if `token` still owns it.
    pub async fn release(&self, name: &str, token: LockToken) -> Result<(), LockError> {
        if self
            .store
            .compare_and_delete(name, &token.to_bytes())
            .await?
        {
            debug!(lock = name, %token, "lock released");
            Ok(())
        } else {
            Err(LockError::NotOwner(name.to_string()))
        }
    }

    /// Acquire and wrap the lock in a guard that releases it on every exit path.
    pub async fn acquire_guard(
        &self,
        name: &str,
        lease: Duration,
        wait_bound: Duration,
    ) -> Result<LockGuard, LockError> {
        let lock = self.acquire(name, lease, wait_bound).await?;
        Ok(LockGuard::new(self.clone(), lock))
    }
}

/// RAII lock guard.
///
/// Prefer [`LockGuard::release`]. If the guard is dropped instead (an early
/// return, or the owning future being cancelled) the release is spawned on
/// the current Tokio runtime.
pub struct LockGuard {
    manager: DistributedLockManager,
    lock: Lock,
    released: bool,
}

impl LockGuard {
    pub const fn new(manager: DistributedLockManager, lock: Lock) -> Self {
        Self {
            manager,
            lock,
            released: false,
        }
    }

    pub const fn lock(&self) -> &Lock {
        &self.lock
    }

    /// Release the lock explicitly.
    pub async fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        self.manager.release(&self.lock.name, self.lock.owner).await
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(lock = %self.lock.name, "lock guard dropped outside a runtime; lease expiry will release it");
            return;
        };
        let manager = self.manager.clone();
        let name = self.lock.name.clone();
        let token = self.lock.owner;
        handle.spawn(async move {
            if let Err(e) = manager.release(&name, token).await {
                debug!(lock = %name, error = %e, "deferred lock release failed");
            }
        });
    }
}
