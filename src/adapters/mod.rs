//! Infrastructure adapters for external systems.

pub mod cache;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
