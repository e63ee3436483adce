//! Durable local cache for offline operation.
//!
//! This module provides:
//! - A string key-value storage trait with a SQLite implementation
//! - A typed collection view that stores one entity list per key
//! - Corruption tolerance: unreadable payloads load as empty collections

mod local;
mod storage;

pub use local::LocalCache;
pub use storage::{KeyValueStore, SqliteStorage};
