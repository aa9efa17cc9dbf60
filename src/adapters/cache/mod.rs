//! Read-through caching layer for repository reads.
//!
//! Wraps a writable backing store as a decorator: reads go through the
//! shared cache with stampede protection, writes evict.

pub mod cached_repository;

pub use cached_repository::CachedRepository;
