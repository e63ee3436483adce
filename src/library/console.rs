//! The four repositories a library console works with, behind one handle.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::info;
use url::Url;

use crate::cache::{KeyValueStore, SqliteStorage};
use crate::config::{BackendConfig, Config};
use crate::remote::RemoteGateway;
use crate::repository::{Repository, SyncReport};

use super::{Author, Book, Loan, Student};

/// Repositories for every collection, sharing one HTTP client and one
/// local store.
pub struct Library<S: KeyValueStore> {
  pub authors: Repository<Author, S>,
  pub books: Repository<Book, S>,
  pub students: Repository<Student, S>,
  pub loans: Repository<Loan, S>,
  loan_return_action: String,
}

impl Library<SqliteStorage> {
  /// Open the library with the SQLite store named by the configuration.
  pub fn open(config: &Config) -> Result<Self> {
    let storage = match &config.storage.path {
      Some(path) => SqliteStorage::open(path)?,
      None => SqliteStorage::open_default()?,
    };
    Self::with_store(&config.backend, Arc::new(storage))
  }
}

impl<S: KeyValueStore> Library<S> {
  /// Build the repositories over an existing store.
  pub fn with_store(backend: &BackendConfig, store: Arc<S>) -> Result<Self> {
    let base = Url::parse(&backend.url)
      .map_err(|e| eyre!("Invalid backend URL {}: {}", backend.url, e))?;
    let client = backend.http_client()?;
    let collections = &backend.collections;

    let gateway = |collection: &str| {
      RemoteGateway::new(client.clone(), &base, collection)
        .map_err(|e| eyre!("Failed to build endpoint for {}: {}", collection, e))
    };

    Ok(Self {
      authors: Repository::new(gateway(&collections.authors)?, store.clone()),
      books: Repository::new(gateway(&collections.books)?, store.clone()),
      students: Repository::new(gateway(&collections.students)?, store.clone()),
      loans: Repository::new(gateway(&collections.loans)?, store),
      loan_return_action: collections.loan_return.clone(),
    })
  }

  /// Probe every collection concurrently. True when all are reachable.
  pub async fn check_backend(&mut self) -> bool {
    let (authors, books, students, loans) = futures::join!(
      self.authors.check_backend(),
      self.books.check_backend(),
      self.students.check_backend(),
      self.loans.check_backend(),
    );
    let online = authors && books && students && loans;
    info!(online, "backend check finished");
    online
  }

  /// Whether every repository is currently talking to the backend.
  pub fn is_online(&self) -> bool {
    self.authors.is_backend_available()
      && self.books.is_backend_available()
      && self.students.is_backend_available()
      && self.loans.is_backend_available()
  }

  /// Load every collection (backend first, local store as fallback).
  pub async fn load_all(&mut self) {
    futures::join!(
      self.authors.load_all(),
      self.books.load_all(),
      self.students.load_all(),
      self.loans.load_all(),
    );
  }

  /// Push records created offline, collection by collection.
  ///
  /// Authors are pushed before books, and students and books before loans.
  /// References held by offline books and loans are rewritten to the ids the
  /// backend assigned before they are pushed. Offline repositories are
  /// skipped.
  pub async fn sync_all(&mut self) -> SyncReport {
    let authors = self.authors.sync_pending().await.unwrap_or_default();
    self.books.remap_author_ids(&authors);
    let books = self.books.sync_pending().await.unwrap_or_default();
    let students = self.students.sync_pending().await.unwrap_or_default();
    self.loans.remap_references(&students, &books);
    let loans = self.loans.sync_pending().await.unwrap_or_default();

    let mut report = SyncReport::default();
    for part in [authors, books, students, loans] {
      report.merge(part);
    }

    info!(
      synced = report.synced.len(),
      failed = report.failed.len(),
      "sync finished"
    );
    report
  }

  /// Register the return of a loan using the configured action segment.
  pub async fn return_loan(&mut self, id: &str) -> bool {
    self.loans.return_loan(id, &self.loan_return_action).await
  }
}
