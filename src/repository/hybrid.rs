//! Repository that serves an entity from the backend when it is reachable
//! and from the local store when it is not.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::cache::{KeyValueStore, LocalCache};
use crate::remote::{GatewayError, RemoteGateway};

use super::local_id;
use super::traits::Entity;

/// Per-entity repository composing the remote gateway and the local store.
///
/// Mutating operations take `&mut self`, so at most one of them is in flight
/// per repository.
pub struct Repository<E: Entity, S: KeyValueStore> {
  pub(crate) gateway: RemoteGateway,
  pub(crate) local: LocalCache<E, S>,
  /// Last known-good collection
  pub(crate) cache: Vec<E>,
  pub(crate) backend_available: bool,
}

impl<E: Entity, S: KeyValueStore> Repository<E, S> {
  /// Create a repository. The backend is assumed reachable until a call
  /// proves otherwise.
  pub fn new(gateway: RemoteGateway, store: Arc<S>) -> Self {
    Self {
      gateway,
      local: LocalCache::new(store, E::storage_key()),
      cache: Vec::new(),
      backend_available: true,
    }
  }

  /// Whether calls currently go to the backend (online/offline badge).
  pub fn is_backend_available(&self) -> bool {
    self.backend_available
  }

  /// The loaded collection, without any I/O.
  pub fn list(&self) -> &[E] {
    &self.cache
  }

  /// Probe the backend and update the reachability flag.
  pub async fn check_backend(&mut self) -> bool {
    match self.gateway.probe().await {
      Ok(()) => self.backend_available = true,
      Err(e) => {
        debug!(entity = E::entity_type(), error = %e, "backend probe failed");
        self.backend_available = false;
      }
    }
    self.backend_available
  }

  /// Load the collection from the backend, falling back to the local store.
  pub async fn load_all(&mut self) -> &[E] {
    if self.backend_available && self.refresh_from_backend().await {
      return &self.cache;
    }
    self.load_all_local()
  }

  /// Load the collection from the local store only.
  pub fn load_all_local(&mut self) -> &[E] {
    self.cache = self.local.load();
    debug!(
      entity = E::entity_type(),
      count = self.cache.len(),
      "loaded from local store"
    );
    &self.cache
  }

  async fn refresh_from_backend(&mut self) -> bool {
    match self.gateway.list::<E::Remote>().await {
      Ok(remote) => {
        // Records created offline stay until sync pushes them
        let pending = self
          .local
          .load()
          .into_iter()
          .filter(|r| local_id::is_local(r.id()));

        self.cache = remote.into_iter().map(Into::<E>::into).chain(pending).collect();
        self.persist();
        info!(
          entity = E::entity_type(),
          count = self.cache.len(),
          "loaded from backend"
        );
        true
      }
      Err(e) => {
        self.demote("load", &e);
        false
      }
    }
  }

  /// Create a record, on the backend if possible, otherwise locally.
  ///
  /// Returns `None` if the draft is rejected by validation.
  pub async fn save(&mut self, draft: E::Draft) -> Option<E> {
    if !self.accepts(&draft) {
      return None;
    }

    if self.backend_available {
      match self.gateway.create::<_, E::Remote>(&draft).await {
        Ok(remote) => {
          let record: E = remote.into();
          self.cache.push(record.clone());
          self.persist();
          info!(entity = E::entity_type(), id = record.id(), "saved to backend");
          return Some(record);
        }
        Err(e) => self.demote("save", &e),
      }
    }

    Some(self.insert_local(draft))
  }

  /// Create a record in the local store with a local-origin id.
  pub fn save_local(&mut self, draft: E::Draft) -> Option<E> {
    if !self.accepts(&draft) {
      return None;
    }
    Some(self.insert_local(draft))
  }

  fn insert_local(&mut self, draft: E::Draft) -> E {
    let record = E::from_draft(local_id::generate(), draft, &self.cache);
    self.cache.push(record.clone());
    self.persist();
    info!(entity = E::entity_type(), id = record.id(), "saved locally");
    record
  }

  fn accepts(&self, draft: &E::Draft) -> bool {
    match E::validate(draft, &self.cache) {
      Ok(()) => true,
      Err(rejection) => {
        warn!(entity = E::entity_type(), %rejection, "draft rejected");
        false
      }
    }
  }

  /// Update a record. Local-origin ids are only ever updated locally.
  ///
  /// Returns `None` if the record does not exist.
  pub async fn update(&mut self, id: &str, patch: E::Patch) -> Option<E> {
    if self.backend_available && !local_id::is_local(id) {
      match self.gateway.replace::<_, E::Remote>(id, &patch).await {
        Ok(remote) => {
          let record: E = remote.into();
          self.replace_cached(id, record.clone());
          info!(entity = E::entity_type(), id, "updated on backend");
          return Some(record);
        }
        Err(e) if e.is_not_found() => {
          debug!(entity = E::entity_type(), id, "not found on backend");
        }
        Err(e) => self.demote("update", &e),
      }
    }

    self.update_local(id, &patch)
  }

  /// Merge a patch into the cached record and persist.
  pub fn update_local(&mut self, id: &str, patch: &E::Patch) -> Option<E> {
    let Some(record) = self.cache.iter_mut().find(|r| r.id() == id) else {
      warn!(entity = E::entity_type(), id, "record not found for update");
      return None;
    };

    record.apply_patch(patch);
    let updated = record.clone();
    self.persist();
    info!(entity = E::entity_type(), id, "updated locally");
    Some(updated)
  }

  /// Swap in a fresh copy of a cached record and persist.
  pub(crate) fn replace_cached(&mut self, id: &str, record: E) {
    if let Some(slot) = self.cache.iter_mut().find(|r| r.id() == id) {
      *slot = record;
    }
    self.persist();
  }

  /// Delete a record. Returns false if nothing was removed.
  pub async fn delete(&mut self, id: &str) -> bool {
    if self.backend_available && !local_id::is_local(id) {
      match self.gateway.delete(id).await {
        Ok(()) => {
          self.cache.retain(|r| r.id() != id);
          self.persist();
          info!(entity = E::entity_type(), id, "deleted on backend");
          return true;
        }
        Err(e) if e.is_not_found() => {
          debug!(entity = E::entity_type(), id, "not found on backend");
        }
        Err(e) => self.demote("delete", &e),
      }
    }

    self.delete_local(id)
  }

  /// Remove a record from the cache and the local store.
  pub fn delete_local(&mut self, id: &str) -> bool {
    let before = self.cache.len();
    self.cache.retain(|r| r.id() != id);

    if self.cache.len() == before {
      warn!(entity = E::entity_type(), id, "record not found for delete");
      return false;
    }

    self.persist();
    info!(entity = E::entity_type(), id, "deleted locally");
    true
  }

  /// Find a record: loaded cache, then backend, then local store.
  pub async fn find_by_id(&mut self, id: &str) -> Option<E> {
    if let Some(record) = self.cache.iter().find(|r| r.id() == id) {
      return Some(record.clone());
    }

    if self.backend_available && !local_id::is_local(id) {
      match self.gateway.get::<E::Remote>(id).await {
        Ok(remote) => {
          let record: E = remote.into();
          self.cache.push(record.clone());
          return Some(record);
        }
        Err(e) if e.is_not_found() => {
          debug!(entity = E::entity_type(), id, "not found on backend");
        }
        Err(e) => self.demote("find", &e),
      }
    }

    self.local.load().into_iter().find(|r| r.id() == id)
  }

  /// Run a filtered backend query, or filter the loaded cache when the
  /// backend cannot answer.
  pub(crate) async fn query<F>(
    &mut self,
    segments: &[&str],
    params: &[(&str, &str)],
    matches: F,
  ) -> Vec<E>
  where
    F: Fn(&E) -> bool,
  {
    if self.backend_available {
      match self
        .gateway
        .list_with::<E::Remote>(segments, params)
        .await
      {
        Ok(remote) => return remote.into_iter().map(Into::<E>::into).collect(),
        Err(e) if e.is_not_found() => return Vec::new(),
        Err(e) => self.demote("query", &e),
      }
    }

    self.cache.iter().filter(|r| matches(r)).cloned().collect()
  }

  /// Apply `rewrite` to every cached and stored record, persisting the store
  /// if any record changed.
  pub(crate) fn rewrite_records<F>(&mut self, mut rewrite: F)
  where
    F: FnMut(&mut E) -> bool,
  {
    for record in self.cache.iter_mut() {
      rewrite(record);
    }

    let mut stored = self.local.load();
    let mut changed = 0;
    for record in stored.iter_mut() {
      if rewrite(record) {
        changed += 1;
      }
    }

    if changed > 0 {
      if let Err(e) = self.local.save(&stored) {
        error!(entity = E::entity_type(), error = %e, "failed to write local store");
        return;
      }
      info!(entity = E::entity_type(), changed, "rewrote references to synced records");
    }
  }

  /// Mirror the cache into the local store.
  pub(crate) fn persist(&self) {
    if let Err(e) = self.local.save(&self.cache) {
      error!(entity = E::entity_type(), error = %e, "failed to write local store");
    }
  }

  /// Switch to local-only mode after a failed backend call.
  pub(crate) fn demote(&mut self, operation: &'static str, err: &GatewayError) {
    warn!(
      entity = E::entity_type(),
      operation,
      error = %err,
      "backend unavailable, falling back to local store"
    );
    self.backend_available = false;
  }
}
