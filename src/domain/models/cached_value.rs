use std::time::{Duration, Instant};
use thiserror::Error;

const TAG_NULL_SENTINEL: u8 = 0x00;
const TAG_VALUE: u8 = 0x01;

/// What the cache holds for a key.
///
/// `NullSentinel` records a confirmed absence in the backing store and is
/// distinct from a key that has simply not been cached yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    Value(Vec<u8>),
    NullSentinel,
}

/// Stored bytes did not carry a recognised tag.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unrecognised cached value encoding (tag {tag:?})")]
pub struct DecodeError {
    pub tag: Option<u8>,
}

impl CachedValue {
    /// Tagged byte encoding written to the cache store.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::NullSentinel => vec![TAG_NULL_SENTINEL],
            Self::Value(payload) => {
                let mut out = Vec::with_capacity(payload.len() + 1);
                out.push(TAG_VALUE);
                out.extend_from_slice(payload);
                out
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        match bytes.split_first() {
            Some((&TAG_NULL_SENTINEL, [])) => Ok(Self::NullSentinel),
            Some((&TAG_VALUE, payload)) => Ok(Self::Value(payload.to_vec())),
            Some((&tag, _)) => Err(DecodeError { tag: Some(tag) }),
            None => Err(DecodeError { tag: None }),
        }
    }

    pub const fn is_null_sentinel(&self) -> bool {
        matches!(self, Self::NullSentinel)
    }
}

/// Entry record kept by in-process cache stores.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Vec<u8>,
    pub expires_at: Instant,
}

impl CacheEntry {
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining_ttl(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}
