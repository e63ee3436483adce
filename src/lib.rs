//! Offline-first data access for a university library console.
//!
//! Each collection is served by a [`Repository`](repository::Repository)
//! that talks to the REST backend while it is reachable and falls back to a
//! local key-value store when it is not. Records created offline carry a
//! `local_` id until [`sync`](repository::Repository::sync) pushes them.

pub mod cache;
pub mod config;
pub mod library;
pub mod logging;
pub mod remote;
pub mod repository;

pub use config::Config;
pub use library::Library;
