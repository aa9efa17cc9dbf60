//! Domain layer for the cacheward consistency layer
//!
//! This module contains the cache data model, error taxonomy and the ports
//! the policy services are written against.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{
    BackingStoreError, CacheError, CacheResult, CacheStoreError, ConsistencyWarning, LockError,
};
