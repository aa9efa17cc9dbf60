//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - CacheStore: shared key-value cache with atomic conditional writes
//! - BackingStore: the system of record
//! - Loader: per-entity-type load function used by the read-through engine
//!
//! These traits let the cache policy layer stay independent of Redis, SQL
//! or any particular client library.

pub mod backing_store;
pub mod cache_store;

pub use backing_store::{BackingStore, Loader, StoreLoader, WritableBackingStore};
pub use cache_store::CacheStore;
