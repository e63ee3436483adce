//! Serde types shared by every backend collection.
//!
//! Entity-specific wire shapes live next to their domain types in
//! `crate::library`; this module only holds the pieces they share.

use serde::{Deserialize, Deserializer};

// ============================================================================
// Response envelope
// ============================================================================

/// Every backend response is wrapped as `{ success, data, message? }`.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
  #[serde(default)]
  pub success: bool,
  pub data: Option<T>,
  #[serde(default)]
  pub message: Option<String>,
}

// ============================================================================
// References to other records
// ============================================================================

/// A foreign key as the backend sends it: either a bare id or the
/// populated referenced document.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiRef {
  Id(String),
  Populated {
    #[serde(rename = "_id", alias = "id")]
    id: String,
    /// Display label of the referenced record (name or title)
    #[serde(default, alias = "nome", alias = "titulo")]
    label: Option<String>,
  },
}

impl ApiRef {
  pub fn id(&self) -> &str {
    match self {
      Self::Id(id) => id,
      Self::Populated { id, .. } => id,
    }
  }

  pub fn label(&self) -> Option<&str> {
    match self {
      Self::Id(_) => None,
      Self::Populated { label, .. } => label.as_deref(),
    }
  }
}

// ============================================================================
// Lenient field decoders
// ============================================================================

/// Decode a field that may be sent as a string or as a number.
///
/// Empty strings and unparseable values decode as `None`.
pub fn int_or_string<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    Int(i64),
    Float(f64),
    Text(String),
  }

  Ok(match Option::<Raw>::deserialize(deserializer)? {
    Some(Raw::Int(n)) => i32::try_from(n).ok(),
    Some(Raw::Float(f)) => Some(f as i32),
    Some(Raw::Text(s)) => s.trim().parse().ok(),
    None => None,
  })
}

/// Decode an optional string, treating `null` as empty.
pub fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode an identifier-like field that may be sent as a string or a number.
pub fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    Text(String),
    Number(serde_json::Number),
  }

  Ok(match Option::<Raw>::deserialize(deserializer)? {
    Some(Raw::Text(s)) => s,
    Some(Raw::Number(n)) => n.to_string(),
    None => String::new(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Deserialize)]
  struct Year {
    #[serde(default, deserialize_with = "int_or_string")]
    year: Option<i32>,
  }

  #[test]
  fn test_ref_accepts_bare_id() {
    let r: ApiRef = serde_json::from_str(r#""65a1""#).unwrap();
    assert_eq!(r.id(), "65a1");
    assert_eq!(r.label(), None);
  }

  #[test]
  fn test_ref_accepts_populated_document() {
    let r: ApiRef = serde_json::from_str(r#"{"_id": "65a1", "titulo": "Dom Casmurro"}"#).unwrap();
    assert_eq!(r.id(), "65a1");
    assert_eq!(r.label(), Some("Dom Casmurro"));
  }

  #[test]
  fn test_year_as_number_or_string() {
    let n: Year = serde_json::from_str(r#"{"year": 1899}"#).unwrap();
    let s: Year = serde_json::from_str(r#"{"year": "1899"}"#).unwrap();
    let empty: Year = serde_json::from_str(r#"{"year": ""}"#).unwrap();
    let missing: Year = serde_json::from_str("{}").unwrap();
    assert_eq!(n.year, Some(1899));
    assert_eq!(s.year, Some(1899));
    assert_eq!(empty.year, None);
    assert_eq!(missing.year, None);
  }

  #[derive(Deserialize)]
  struct Registration {
    #[serde(default, deserialize_with = "text_or_number")]
    number: String,
  }

  #[test]
  fn test_registration_as_number_or_string() {
    let n: Registration = serde_json::from_str(r#"{"number": 20230001}"#).unwrap();
    let s: Registration = serde_json::from_str(r#"{"number": "20230002"}"#).unwrap();
    let null: Registration = serde_json::from_str(r#"{"number": null}"#).unwrap();
    assert_eq!(n.number, "20230001");
    assert_eq!(s.number, "20230002");
    assert_eq!(null.number, "");
  }

  #[test]
  fn test_envelope_without_data() {
    let env: ApiEnvelope<Vec<String>> =
      serde_json::from_str(r#"{"success": false, "message": "duplicado"}"#).unwrap();
    assert!(!env.success);
    assert!(env.data.is_none());
    assert_eq!(env.message.as_deref(), Some("duplicado"));
  }
}
