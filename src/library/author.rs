use serde::{Deserialize, Serialize};

use crate::cache::KeyValueStore;
use crate::remote::api_types::string_or_null;
use crate::repository::{require, Entity, Rejection, Repository};

/// Book author
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub nationality: String,
  #[serde(default)]
  pub biography: String,
  #[serde(default)]
  pub birth_date: Option<String>,
}

/// New author, in backend wire format
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewAuthor {
  #[serde(rename = "nome")]
  pub name: String,
  #[serde(rename = "nacionalidade")]
  pub nationality: String,
  #[serde(rename = "biografia")]
  pub biography: String,
  #[serde(rename = "dataNascimento")]
  pub birth_date: Option<String>,
}

impl NewAuthor {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Default::default()
    }
  }

  pub fn nationality(mut self, nationality: impl Into<String>) -> Self {
    self.nationality = nationality.into();
    self
  }

  pub fn biography(mut self, biography: impl Into<String>) -> Self {
    self.biography = biography.into();
    self
  }
}

/// Partial author update, in backend wire format
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthorPatch {
  #[serde(rename = "nome", skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(rename = "nacionalidade", skip_serializing_if = "Option::is_none")]
  pub nationality: Option<String>,
  #[serde(rename = "biografia", skip_serializing_if = "Option::is_none")]
  pub biography: Option<String>,
  #[serde(rename = "dataNascimento", skip_serializing_if = "Option::is_none")]
  pub birth_date: Option<String>,
}

/// Author as the backend returns it
#[derive(Debug, Deserialize)]
pub struct ApiAuthor {
  #[serde(rename = "_id", alias = "id")]
  pub id: String,
  #[serde(rename = "nome", default, deserialize_with = "string_or_null")]
  pub name: String,
  #[serde(rename = "nacionalidade", default, deserialize_with = "string_or_null")]
  pub nationality: String,
  #[serde(rename = "biografia", default, deserialize_with = "string_or_null")]
  pub biography: String,
  #[serde(rename = "dataNascimento", default)]
  pub birth_date: Option<String>,
}

impl From<ApiAuthor> for Author {
  fn from(a: ApiAuthor) -> Self {
    Author {
      id: a.id,
      name: a.name,
      nationality: a.nationality,
      biography: a.biography,
      birth_date: a.birth_date,
    }
  }
}

impl Entity for Author {
  type Draft = NewAuthor;
  type Patch = AuthorPatch;
  type Remote = ApiAuthor;

  fn entity_type() -> &'static str {
    "author"
  }

  fn storage_key() -> &'static str {
    "autores_biblioteca"
  }

  fn id(&self) -> &str {
    &self.id
  }

  fn validate(draft: &NewAuthor, _existing: &[Self]) -> Result<(), Rejection> {
    require("name", &draft.name)
  }

  fn from_draft(id: String, draft: NewAuthor, _existing: &[Self]) -> Self {
    Author {
      id,
      name: draft.name,
      nationality: draft.nationality,
      biography: draft.biography,
      birth_date: draft.birth_date,
    }
  }

  fn to_draft(&self) -> NewAuthor {
    NewAuthor {
      name: self.name.clone(),
      nationality: self.nationality.clone(),
      biography: self.biography.clone(),
      birth_date: self.birth_date.clone(),
    }
  }

  fn apply_patch(&mut self, patch: &AuthorPatch) {
    if let Some(name) = &patch.name {
      self.name = name.clone();
    }
    if let Some(nationality) = &patch.nationality {
      self.nationality = nationality.clone();
    }
    if let Some(biography) = &patch.biography {
      self.biography = biography.clone();
    }
    if let Some(birth_date) = &patch.birth_date {
      self.birth_date = Some(birth_date.clone());
    }
  }
}

impl<S: KeyValueStore> Repository<Author, S> {
  /// Search authors by name (case-insensitive substring when offline).
  pub async fn find_by_name(&mut self, name: &str) -> Vec<Author> {
    let needle = name.to_lowercase();
    self
      .query(&["search", name], &[], |a| {
        a.name.to_lowercase().contains(&needle)
      })
      .await
  }
}
