//! Reconciliation: pushing records created offline to the backend.

use tracing::{info, warn};

use crate::cache::KeyValueStore;

use super::hybrid::Repository;
use super::local_id;
use super::traits::Entity;

/// Outcome of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
  /// Local ids accepted by the backend and removed from the local store
  pub synced: Vec<String>,
  /// Local ids the backend did not accept; they stay for the next pass
  pub failed: Vec<String>,
  /// `(local id, backend id)` for every synced record whose backend id was
  /// returned
  pub assigned: Vec<(String, String)>,
}

impl SyncReport {
  pub fn is_clean(&self) -> bool {
    self.failed.is_empty()
  }

  pub fn merge(&mut self, other: SyncReport) {
    self.synced.extend(other.synced);
    self.failed.extend(other.failed);
    self.assigned.extend(other.assigned);
  }

  /// Backend id assigned to a record synced under `local_id`.
  pub fn backend_id(&self, local_id: &str) -> Option<&str> {
    self
      .assigned
      .iter()
      .find(|(local, _)| local == local_id)
      .map(|(_, remote)| remote.as_str())
  }
}

impl<E: Entity, S: KeyValueStore> Repository<E, S> {
  /// Push local-origin records to the backend.
  ///
  /// Returns false only when the backend is known to be unavailable. A pass
  /// where individual records fail still returns true; those records keep
  /// their local id until the next call.
  pub async fn sync(&mut self) -> bool {
    self.sync_pending().await.is_some()
  }

  /// Like [`sync`](Self::sync), reporting which records were pushed.
  ///
  /// Failed records are not retried automatically.
  pub async fn sync_pending(&mut self) -> Option<SyncReport> {
    if !self.backend_available {
      info!(entity = E::entity_type(), "backend unavailable, skipping sync");
      return None;
    }

    let stored = self.local.load();
    let pending: Vec<E> = stored
      .iter()
      .filter(|r| local_id::is_local(r.id()))
      .cloned()
      .collect();

    let mut report = SyncReport::default();
    if pending.is_empty() {
      info!(entity = E::entity_type(), "nothing to sync");
      return Some(report);
    }

    info!(
      entity = E::entity_type(),
      count = pending.len(),
      "syncing local records"
    );
    self.cache = stored;

    for record in pending {
      let id = record.id().to_string();
      match self
        .gateway
        .create::<_, serde_json::Value>(&record.to_draft())
        .await
      {
        Ok(created) => {
          self.cache.retain(|r| r.id() != id);
          self.persist();
          match created_id(&created) {
            Some(remote) => {
              info!(entity = E::entity_type(), id = %id, remote_id = %remote, "synced");
              report.assigned.push((id.clone(), remote));
            }
            None => info!(entity = E::entity_type(), id = %id, "synced"),
          }
          report.synced.push(id);
        }
        Err(e) => {
          warn!(entity = E::entity_type(), id = %id, error = %e, "sync failed");
          report.failed.push(id);
        }
      }
    }

    self.load_all().await;
    Some(report)
  }
}

/// Id of the record the backend created, if its answer carries one.
fn created_id(created: &serde_json::Value) -> Option<String> {
  created
    .get("_id")
    .or_else(|| created.get("id"))
    .and_then(serde_json::Value::as_str)
    .map(str::to_string)
}
