use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::cache::KeyValueStore;
use crate::remote::api_types::{int_or_string, string_or_null, ApiRef};
use crate::repository::{require, require_unique, Entity, Rejection, Repository, SyncReport};

/// Prefix of ISBNs generated for books created offline
pub const LOCAL_ISBN_PREFIX: &str = "LOCAL-";

/// Catalog category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
  #[serde(rename = "Computação")]
  Computing,
  #[serde(rename = "Tecnologia")]
  Technology,
  #[serde(rename = "Literatura")]
  Literature,
  #[serde(rename = "Ciências")]
  Science,
  #[serde(rename = "Matemática")]
  Mathematics,
  #[serde(rename = "Filosofia")]
  Philosophy,
}

impl Category {
  pub const ALL: [Category; 6] = [
    Category::Computing,
    Category::Technology,
    Category::Literature,
    Category::Science,
    Category::Mathematics,
    Category::Philosophy,
  ];

  /// Label used by the backend and shown in the console
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Computing => "Computação",
      Self::Technology => "Tecnologia",
      Self::Literature => "Literatura",
      Self::Science => "Ciências",
      Self::Mathematics => "Matemática",
      Self::Philosophy => "Filosofia",
    }
  }

  pub fn from_label(label: &str) -> Option<Self> {
    Self::ALL
      .into_iter()
      .find(|c| c.as_str().eq_ignore_ascii_case(label.trim()))
  }
}

/// Unknown or empty categories decode as `None` instead of failing the record.
fn lenient_category<'de, D>(deserializer: D) -> Result<Option<Category>, D::Error>
where
  D: Deserializer<'de>,
{
  let label = Option::<String>::deserialize(deserializer)?;
  Ok(label.as_deref().and_then(Category::from_label))
}

fn available_by_default() -> bool {
  true
}

/// Only an explicit `false` marks a book unavailable.
fn lenient_available<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

/// Catalog book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub isbn: String,
  #[serde(default)]
  pub year: Option<i32>,
  #[serde(default)]
  pub category: Option<Category>,
  #[serde(default)]
  pub author_id: Option<String>,
  /// Display only, filled when the backend populates the author
  #[serde(default)]
  pub author_name: String,
  #[serde(default = "available_by_default")]
  pub available: bool,
  #[serde(default)]
  pub registered_at: Option<DateTime<Utc>>,
}

/// New book, in backend wire format
#[derive(Debug, Clone, Serialize)]
pub struct NewBook {
  #[serde(rename = "titulo")]
  pub title: String,
  pub isbn: String,
  #[serde(rename = "autor")]
  pub author_id: Option<String>,
  #[serde(rename = "categoria")]
  pub category: Option<Category>,
  #[serde(rename = "anoPublicacao")]
  pub year: Option<i32>,
  #[serde(rename = "disponivel")]
  pub available: bool,
}

impl NewBook {
  pub fn new(title: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      isbn: String::new(),
      author_id: None,
      category: None,
      year: None,
      available: true,
    }
  }

  pub fn isbn(mut self, isbn: impl Into<String>) -> Self {
    self.isbn = isbn.into();
    self
  }

  pub fn author(mut self, author_id: impl Into<String>) -> Self {
    self.author_id = Some(author_id.into());
    self
  }

  pub fn category(mut self, category: Category) -> Self {
    self.category = Some(category);
    self
  }

  pub fn year(mut self, year: i32) -> Self {
    self.year = Some(year);
    self
  }
}

/// Partial book update, in backend wire format
#[derive(Debug, Clone, Default, Serialize)]
pub struct BookPatch {
  #[serde(rename = "titulo", skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub isbn: Option<String>,
  #[serde(rename = "autor", skip_serializing_if = "Option::is_none")]
  pub author_id: Option<String>,
  #[serde(rename = "categoria", skip_serializing_if = "Option::is_none")]
  pub category: Option<Category>,
  #[serde(rename = "anoPublicacao", skip_serializing_if = "Option::is_none")]
  pub year: Option<i32>,
  #[serde(rename = "disponivel", skip_serializing_if = "Option::is_none")]
  pub available: Option<bool>,
}

/// Book as the backend returns it
#[derive(Debug, Deserialize)]
pub struct ApiBook {
  #[serde(rename = "_id", alias = "id")]
  pub id: String,
  #[serde(rename = "titulo", default, deserialize_with = "string_or_null")]
  pub title: String,
  #[serde(default, deserialize_with = "string_or_null")]
  pub isbn: String,
  #[serde(rename = "autor", default)]
  pub author: Option<ApiRef>,
  #[serde(rename = "categoria", default, deserialize_with = "lenient_category")]
  pub category: Option<Category>,
  #[serde(
    rename = "anoPublicacao",
    alias = "ano",
    default,
    deserialize_with = "int_or_string"
  )]
  pub year: Option<i32>,
  #[serde(
    rename = "disponivel",
    default = "available_by_default",
    deserialize_with = "lenient_available"
  )]
  pub available: bool,
  #[serde(rename = "dataCadastro", default)]
  pub registered_at: Option<DateTime<Utc>>,
}

impl From<ApiBook> for Book {
  fn from(b: ApiBook) -> Self {
    Book {
      id: b.id,
      title: b.title,
      isbn: b.isbn,
      year: b.year,
      category: b.category,
      author_id: b.author.as_ref().map(|a| a.id().to_string()),
      author_name: b
        .author
        .as_ref()
        .and_then(|a| a.label())
        .unwrap_or_default()
        .to_string(),
      available: b.available,
      registered_at: b.registered_at,
    }
  }
}

/// Generate an ISBN placeholder not used by any `existing` book.
fn local_isbn(existing: &[Book]) -> String {
  let millis = Utc::now().timestamp_millis().unsigned_abs();
  let mut n = millis % 10_000_000_000;
  loop {
    let candidate = format!("{}{:010}", LOCAL_ISBN_PREFIX, n);
    if !existing.iter().any(|b| b.isbn == candidate) {
      return candidate;
    }
    n = (n + 1) % 10_000_000_000;
  }
}

impl Entity for Book {
  type Draft = NewBook;
  type Patch = BookPatch;
  type Remote = ApiBook;

  fn entity_type() -> &'static str {
    "book"
  }

  fn storage_key() -> &'static str {
    "livros_biblioteca"
  }

  fn id(&self) -> &str {
    &self.id
  }

  fn validate(draft: &NewBook, existing: &[Self]) -> Result<(), Rejection> {
    require("title", &draft.title)?;
    require_unique("title", &draft.title, existing, |b| b.title.as_str())?;
    if !draft.isbn.trim().is_empty() {
      require_unique("isbn", &draft.isbn, existing, |b| b.isbn.as_str())?;
    }
    Ok(())
  }

  fn from_draft(id: String, draft: NewBook, existing: &[Self]) -> Self {
    let isbn = if draft.isbn.trim().is_empty() {
      local_isbn(existing)
    } else {
      draft.isbn
    };

    Book {
      id,
      title: draft.title,
      isbn,
      year: draft.year,
      category: draft.category,
      author_id: draft.author_id,
      author_name: String::new(),
      available: draft.available,
      registered_at: Some(Utc::now()),
    }
  }

  fn to_draft(&self) -> NewBook {
    NewBook {
      title: self.title.clone(),
      isbn: self.isbn.clone(),
      author_id: self.author_id.clone(),
      category: self.category,
      year: self.year,
      available: self.available,
    }
  }

  fn apply_patch(&mut self, patch: &BookPatch) {
    if let Some(title) = &patch.title {
      self.title = title.clone();
    }
    if let Some(isbn) = &patch.isbn {
      self.isbn = isbn.clone();
    }
    if let Some(author_id) = &patch.author_id {
      if self.author_id.as_ref() != Some(author_id) {
        self.author_name.clear();
      }
      self.author_id = Some(author_id.clone());
    }
    if let Some(category) = patch.category {
      self.category = Some(category);
    }
    if let Some(year) = patch.year {
      self.year = Some(year);
    }
    if let Some(available) = patch.available {
      self.available = available;
    }
  }
}

impl<S: KeyValueStore> Repository<Book, S> {
  /// Point books at the backend ids of authors that were synced.
  pub fn remap_author_ids(&mut self, authors: &SyncReport) {
    if authors.assigned.is_empty() {
      return;
    }
    self.rewrite_records(|book| {
      let remote = book
        .author_id
        .as_deref()
        .and_then(|id| authors.backend_id(id))
        .map(str::to_string);
      match remote {
        Some(remote) => {
          book.author_id = Some(remote);
          true
        }
        None => false,
      }
    });
  }

  /// Search books by title (case-insensitive substring when offline).
  pub async fn find_by_title(&mut self, title: &str) -> Vec<Book> {
    let needle = title.to_lowercase();
    self
      .query(&[], &[("search", title)], |b| {
        b.title.to_lowercase().contains(&needle)
      })
      .await
  }

  /// Books in one category.
  pub async fn find_by_category(&mut self, category: Category) -> Vec<Book> {
    self
      .query(&[], &[("categoria", category.as_str())], |b| {
        b.category == Some(category)
      })
      .await
  }
}
