//! Typed view over one entity collection in the key-value store.

use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{error, warn};

use super::storage::KeyValueStore;

/// One entity's full collection, stored as a single JSON array.
///
/// Reads and writes always cover the whole list; there are no partial writes.
pub struct LocalCache<T, S: KeyValueStore> {
  store: Arc<S>,
  key: String,
  _marker: PhantomData<fn() -> T>,
}

impl<T, S> LocalCache<T, S>
where
  T: Serialize + DeserializeOwned,
  S: KeyValueStore,
{
  pub fn new(store: Arc<S>, key: impl Into<String>) -> Self {
    Self {
      store,
      key: key.into(),
      _marker: PhantomData,
    }
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  /// Load the stored collection.
  ///
  /// A missing key, an unreadable store or a corrupt payload all yield an
  /// empty list.
  pub fn load(&self) -> Vec<T> {
    let raw = match self.store.get(&self.key) {
      Ok(Some(raw)) => raw,
      Ok(None) => return Vec::new(),
      Err(e) => {
        error!(key = %self.key, error = %e, "failed to read local store");
        return Vec::new();
      }
    };

    match serde_json::from_str(&raw) {
      Ok(records) => records,
      Err(e) => {
        warn!(key = %self.key, error = %e, "discarding corrupt local collection");
        Vec::new()
      }
    }
  }

  /// Replace the stored collection with `records`.
  pub fn save(&self, records: &[T]) -> Result<()> {
    let raw = serde_json::to_string(records)
      .map_err(|e| eyre!("Failed to serialize {}: {}", self.key, e))?;
    self.store.set(&self.key, &raw)
  }
}

impl<T, S: KeyValueStore> Clone for LocalCache<T, S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      key: self.key.clone(),
      _marker: PhantomData,
    }
  }
}
