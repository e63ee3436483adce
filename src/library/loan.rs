use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::cache::KeyValueStore;
use crate::remote::api_types::ApiRef;
use crate::repository::{local_id, require, Entity, Rejection, Repository, SyncReport};

/// Length of a loan
pub const LOAN_PERIOD_DAYS: i64 = 15;

/// Due date for a loan taken at `loan_date`.
pub fn due_date_for(loan_date: DateTime<Utc>) -> DateTime<Utc> {
  loan_date + Duration::days(LOAN_PERIOD_DAYS)
}

/// Stored loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoanStatus {
  #[default]
  #[serde(rename = "ativo")]
  Active,
  #[serde(rename = "devolvido")]
  Returned,
  #[serde(rename = "atrasado")]
  Overdue,
}

fn lenient_status<'de, D>(deserializer: D) -> Result<LoanStatus, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match Option::<String>::deserialize(deserializer)?.as_deref() {
    Some("devolvido") => LoanStatus::Returned,
    Some("atrasado") => LoanStatus::Overdue,
    _ => LoanStatus::Active,
  })
}

/// Book loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
  pub id: String,
  pub student_id: String,
  pub book_id: String,
  /// Display only
  #[serde(default)]
  pub student_name: String,
  /// Display only
  #[serde(default)]
  pub book_title: String,
  pub loan_date: DateTime<Utc>,
  pub due_date: DateTime<Utc>,
  #[serde(default)]
  pub return_date: Option<DateTime<Utc>>,
  #[serde(default)]
  pub status: LoanStatus,
  #[serde(default)]
  pub version: u32,
}

impl Loan {
  /// Whether the book is still out.
  pub fn is_pending(&self) -> bool {
    self.return_date.is_none()
  }

  /// Status at `now`: a pending loan past its due date is overdue.
  pub fn status_at(&self, now: DateTime<Utc>) -> LoanStatus {
    if self.return_date.is_some() {
      LoanStatus::Returned
    } else if now > self.due_date || self.status == LoanStatus::Overdue {
      LoanStatus::Overdue
    } else {
      LoanStatus::Active
    }
  }

  /// Mark the loan returned at `when`.
  pub fn mark_returned(&mut self, when: DateTime<Utc>) {
    self.return_date = Some(when);
    self.status = LoanStatus::Returned;
  }

  /// Make `status` agree with `return_date`, which is authoritative.
  fn normalize_status(&mut self) {
    if self.return_date.is_some() {
      self.status = LoanStatus::Returned;
    } else if self.status == LoanStatus::Returned {
      self.status = LoanStatus::Active;
    }
  }
}

/// New loan, in backend wire format
#[derive(Debug, Clone, Serialize)]
pub struct NewLoan {
  #[serde(rename = "usuario")]
  student_id: String,
  #[serde(rename = "livro")]
  book_id: String,
  #[serde(rename = "dataEmprestimo")]
  loan_date: DateTime<Utc>,
  #[serde(rename = "dataDevolucaoPrevista")]
  due_date: DateTime<Utc>,
  #[serde(rename = "dataDevolucaoReal", skip_serializing_if = "Option::is_none")]
  return_date: Option<DateTime<Utc>>,
  status: LoanStatus,
  #[serde(skip)]
  explicit_due_date: bool,
}

impl NewLoan {
  /// A loan starting now, due in [`LOAN_PERIOD_DAYS`] days.
  pub fn new(student_id: impl Into<String>, book_id: impl Into<String>) -> Self {
    let loan_date = Utc::now();
    Self {
      student_id: student_id.into(),
      book_id: book_id.into(),
      loan_date,
      due_date: due_date_for(loan_date),
      return_date: None,
      status: LoanStatus::Active,
      explicit_due_date: false,
    }
  }

  /// Start the loan at `loan_date`; the due date follows unless it was set.
  pub fn loan_date(mut self, loan_date: DateTime<Utc>) -> Self {
    self.loan_date = loan_date;
    if !self.explicit_due_date {
      self.due_date = due_date_for(loan_date);
    }
    self
  }

  /// Override the derived due date.
  pub fn due_date(mut self, due_date: DateTime<Utc>) -> Self {
    self.due_date = due_date;
    self.explicit_due_date = true;
    self
  }

  pub fn student_id(&self) -> &str {
    &self.student_id
  }

  pub fn book_id(&self) -> &str {
    &self.book_id
  }
}

/// Partial loan update, in backend wire format.
///
/// Setting a new loan date moves the due date with it unless a due date is
/// set explicitly afterwards.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoanPatch {
  #[serde(rename = "usuario", skip_serializing_if = "Option::is_none")]
  student_id: Option<String>,
  #[serde(rename = "livro", skip_serializing_if = "Option::is_none")]
  book_id: Option<String>,
  #[serde(rename = "dataEmprestimo", skip_serializing_if = "Option::is_none")]
  loan_date: Option<DateTime<Utc>>,
  #[serde(
    rename = "dataDevolucaoPrevista",
    skip_serializing_if = "Option::is_none"
  )]
  due_date: Option<DateTime<Utc>>,
  #[serde(skip)]
  explicit_due_date: bool,
}

impl LoanPatch {
  pub fn student_id(mut self, student_id: impl Into<String>) -> Self {
    self.student_id = Some(student_id.into());
    self
  }

  pub fn book_id(mut self, book_id: impl Into<String>) -> Self {
    self.book_id = Some(book_id.into());
    self
  }

  pub fn loan_date(mut self, loan_date: DateTime<Utc>) -> Self {
    self.loan_date = Some(loan_date);
    if !self.explicit_due_date {
      self.due_date = Some(due_date_for(loan_date));
    }
    self
  }

  pub fn due_date(mut self, due_date: DateTime<Utc>) -> Self {
    self.due_date = Some(due_date);
    self.explicit_due_date = true;
    self
  }
}

/// Loan as the backend returns it
#[derive(Debug, Deserialize)]
pub struct ApiLoan {
  #[serde(rename = "_id", alias = "id")]
  pub id: String,
  /// `null` when the referenced student was deleted
  #[serde(rename = "usuario", default)]
  pub student: Option<ApiRef>,
  /// `null` when the referenced book was deleted
  #[serde(rename = "livro", default)]
  pub book: Option<ApiRef>,
  #[serde(rename = "dataEmprestimo")]
  pub loan_date: DateTime<Utc>,
  #[serde(rename = "dataDevolucaoPrevista", default)]
  pub due_date: Option<DateTime<Utc>>,
  #[serde(rename = "dataDevolucaoReal", default)]
  pub return_date: Option<DateTime<Utc>>,
  #[serde(default, deserialize_with = "lenient_status")]
  pub status: LoanStatus,
  #[serde(rename = "__v", default)]
  pub version: u32,
}

fn ref_id(r: &Option<ApiRef>) -> String {
  r.as_ref().map(|r| r.id().to_string()).unwrap_or_default()
}

fn ref_label(r: &Option<ApiRef>) -> String {
  r.as_ref()
    .and_then(ApiRef::label)
    .unwrap_or_default()
    .to_string()
}

impl From<ApiLoan> for Loan {
  fn from(l: ApiLoan) -> Self {
    let mut loan = Loan {
      id: l.id,
      student_id: ref_id(&l.student),
      book_id: ref_id(&l.book),
      student_name: ref_label(&l.student),
      book_title: ref_label(&l.book),
      loan_date: l.loan_date,
      due_date: l.due_date.unwrap_or_else(|| due_date_for(l.loan_date)),
      return_date: l.return_date,
      status: l.status,
      version: l.version,
    };
    loan.normalize_status();
    loan
  }
}

/// Body of the return action
#[derive(Debug, Serialize)]
struct ReturnBody {
  #[serde(rename = "dataDevolucaoReal")]
  return_date: DateTime<Utc>,
  status: LoanStatus,
}

impl Entity for Loan {
  type Draft = NewLoan;
  type Patch = LoanPatch;
  type Remote = ApiLoan;

  fn entity_type() -> &'static str {
    "loan"
  }

  fn storage_key() -> &'static str {
    "emprestimos_biblioteca"
  }

  fn id(&self) -> &str {
    &self.id
  }

  fn validate(draft: &NewLoan, _existing: &[Self]) -> Result<(), Rejection> {
    require("student", &draft.student_id)?;
    require("book", &draft.book_id)
  }

  fn from_draft(id: String, draft: NewLoan, _existing: &[Self]) -> Self {
    let mut loan = Loan {
      id,
      student_id: draft.student_id,
      book_id: draft.book_id,
      student_name: String::new(),
      book_title: String::new(),
      loan_date: draft.loan_date,
      due_date: draft.due_date,
      return_date: draft.return_date,
      status: draft.status,
      version: 0,
    };
    loan.normalize_status();
    loan
  }

  fn to_draft(&self) -> NewLoan {
    NewLoan {
      student_id: self.student_id.clone(),
      book_id: self.book_id.clone(),
      loan_date: self.loan_date,
      due_date: self.due_date,
      return_date: self.return_date,
      status: self.status,
      explicit_due_date: true,
    }
  }

  fn apply_patch(&mut self, patch: &LoanPatch) {
    if let Some(student_id) = &patch.student_id {
      if *student_id != self.student_id {
        self.student_name.clear();
      }
      self.student_id = student_id.clone();
    }
    if let Some(book_id) = &patch.book_id {
      if *book_id != self.book_id {
        self.book_title.clear();
      }
      self.book_id = book_id.clone();
    }
    if let Some(loan_date) = patch.loan_date {
      self.loan_date = loan_date;
    }
    if let Some(due_date) = patch.due_date {
      self.due_date = due_date;
    }
  }
}

impl<S: KeyValueStore> Repository<Loan, S> {
  /// Point loans at the backend ids of students and books that were synced.
  pub fn remap_references(&mut self, students: &SyncReport, books: &SyncReport) {
    if students.assigned.is_empty() && books.assigned.is_empty() {
      return;
    }
    self.rewrite_records(|loan| {
      let mut changed = false;
      if let Some(remote) = students.backend_id(&loan.student_id) {
        loan.student_id = remote.to_string();
        changed = true;
      }
      if let Some(remote) = books.backend_id(&loan.book_id) {
        loan.book_id = remote.to_string();
        changed = true;
      }
      changed
    });
  }

  /// Register the return of a loan.
  ///
  /// Returns false if the loan is not in the loaded collection.
  pub async fn return_loan(&mut self, id: &str, return_action: &str) -> bool {
    if !self.cache.iter().any(|l| l.id == id) {
      warn!(entity = "loan", id, "loan not found for return");
      return false;
    }

    let now = Utc::now();
    if self.backend_available && !local_id::is_local(id) {
      let body = ReturnBody {
        return_date: now,
        status: LoanStatus::Returned,
      };
      match self
        .gateway
        .patch_action::<_, ApiLoan>(id, return_action, &body)
        .await
      {
        Ok(remote) => {
          self.replace_cached(id, remote.into());
          info!(entity = "loan", id, "return registered on backend");
          return true;
        }
        Err(e) if e.is_not_found() => {
          debug!(entity = "loan", id, "not found on backend");
        }
        Err(e) => self.demote("return", &e),
      }
    }

    self.return_loan_local(id, now)
  }

  fn return_loan_local(&mut self, id: &str, when: DateTime<Utc>) -> bool {
    let Some(loan) = self.cache.iter_mut().find(|l| l.id == id) else {
      return false;
    };

    loan.mark_returned(when);
    self.persist();
    info!(entity = "loan", id, "return registered locally");
    true
  }

  /// Loans of one student.
  pub async fn find_by_student(&mut self, student_id: &str) -> Vec<Loan> {
    self
      .query(&["aluno", student_id], &[], |l| l.student_id == student_id)
      .await
  }

  /// Loans whose book has not been returned.
  pub async fn find_pending(&mut self) -> Vec<Loan> {
    self
      .query(&[], &[("status", "ativo")], Loan::is_pending)
      .await
  }

  /// Loaded loans that are overdue at `now`.
  pub fn overdue(&self, now: DateTime<Utc>) -> Vec<Loan> {
    self
      .cache
      .iter()
      .filter(|l| l.status_at(now) == LoanStatus::Overdue)
      .cloned()
      .collect()
  }
}
