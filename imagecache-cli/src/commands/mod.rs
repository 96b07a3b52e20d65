//! CLI command implementations.
//!
//! - [`cache`] - Disk cache operations (put, get, clear, stats, path)

pub mod cache;
