//! In-process adapters for the cache and backing store ports.

pub mod backing_store;
pub mod cache_store;

pub use backing_store::InMemoryBackingStore;
pub use cache_store::InMemoryCacheStore;
