//! Core traits and types for the repository layer.

use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

/// Adapter between a domain record, its backend wire shapes and the local
/// store.
///
/// One implementation per entity supplies everything entity-specific; the
/// generic [`Repository`](super::Repository) supplies the protocol.
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Creation payload, serialized in backend wire format.
  type Draft: Serialize + Send + Sync;

  /// Partial update, serialized in backend wire format.
  type Patch: Serialize + Send + Sync;

  /// Record shape as the backend returns it.
  type Remote: DeserializeOwned + Into<Self> + Send;

  /// Entity type name for logs (e.g. "book").
  fn entity_type() -> &'static str;

  /// Storage key of the entity's collection in the local store.
  fn storage_key() -> &'static str;

  /// Unique identifier of this record.
  fn id(&self) -> &str;

  /// Check a draft against the loaded collection before it is stored
  /// anywhere: required fields and unique fields.
  fn validate(draft: &Self::Draft, existing: &[Self]) -> Result<(), Rejection>;

  /// Build a record from a draft that could not reach the backend.
  ///
  /// `existing` is the loaded collection, for fields that must be
  /// generated uniquely (e.g. ISBN, registration number).
  fn from_draft(id: String, draft: Self::Draft, existing: &[Self]) -> Self;

  /// Wire payload to push a locally created record to the backend.
  ///
  /// Client-only fields (id, version marker, derived display fields) are
  /// not part of the draft.
  fn to_draft(&self) -> Self::Draft;

  /// Merge a patch over this record. The id is never touched.
  fn apply_patch(&mut self, patch: &Self::Patch);
}

/// Why a draft was refused before any storage or network mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
  /// A required field is missing or blank
  Missing(&'static str),
  /// A unique field collides with an existing record
  Duplicate { field: &'static str, value: String },
  /// A field is present but malformed
  Invalid { field: &'static str, value: String },
}

impl fmt::Display for Rejection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Missing(field) => write!(f, "{} is required", field),
      Self::Duplicate { field, value } => write!(f, "{} '{}' already exists", field, value),
      Self::Invalid { field, value } => write!(f, "{} '{}' is invalid", field, value),
    }
  }
}

/// Require a non-blank value.
pub fn require(field: &'static str, value: &str) -> Result<(), Rejection> {
  if value.trim().is_empty() {
    Err(Rejection::Missing(field))
  } else {
    Ok(())
  }
}

/// Reject `value` if any existing record already carries it.
pub fn require_unique<E, F>(
  field: &'static str,
  value: &str,
  existing: &[E],
  extract: F,
) -> Result<(), Rejection>
where
  F: Fn(&E) -> &str,
{
  if existing.iter().any(|e| extract(e) == value) {
    Err(Rejection::Duplicate {
      field,
      value: value.to_string(),
    })
  } else {
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_require_rejects_blank() {
    assert_eq!(require("title", "  "), Err(Rejection::Missing("title")));
    assert!(require("title", "Vidas Secas").is_ok());
  }

  #[test]
  fn test_require_unique() {
    let titles = vec!["Vidas Secas".to_string(), "Iracema".to_string()];
    let err = require_unique("title", "Iracema", &titles, |t| t.as_str()).unwrap_err();
    assert_eq!(err.to_string(), "title 'Iracema' already exists");
    assert!(require_unique("title", "Macunaíma", &titles, |t| t.as_str()).is_ok());
  }
}
