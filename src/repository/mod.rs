//! Offline-first repositories.
//!
//! A [`Repository`] serves one entity collection:
//! - Backend first while it is reachable, local store otherwise
//! - Every successful mutation is mirrored into the local store
//! - Records created offline carry a `local_` id until [`Repository::sync`]
//!   pushes them to the backend

mod hybrid;
pub mod local_id;
mod sync;
mod traits;

pub use hybrid::Repository;
pub use sync::SyncReport;
pub use traits::{require, require_unique, Entity, Rejection};
