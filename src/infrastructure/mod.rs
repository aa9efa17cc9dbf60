//! Infrastructure layer module
//!
//! Configuration management and logging for the binary and for embedders
//! that want the same layered setup.

pub mod config;
pub mod logging;
