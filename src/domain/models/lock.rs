use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Ownership proof for a distributed lock, issued at acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockToken(Uuid);

impl LockToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Bytes stored as the lock key's value.
    pub fn to_bytes(self) -> Vec<u8> {
        self.0.to_string().into_bytes()
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A granted lease on a named lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lock {
    pub name: String,
    pub owner: LockToken,
    pub lease_expires_at: DateTime<Utc>,
}

impl Lock {
    pub fn new(name: impl Into<String>, owner: LockToken, lease: Duration) -> Self {
        // Leases are seconds long; anything that overflows is clamped to a day.
        let lease = chrono::Duration::from_std(lease)
            .unwrap_or_else(|_| chrono::Duration::days(1))
            .min(chrono::Duration::days(1));
        Self {
            name: name.into(),
            owner,
            lease_expires_at: Utc::now() + lease,
        }
    }

    /// Whether the lease has run out locally. The store's TTL is authoritative.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.lease_expires_at
    }
}
