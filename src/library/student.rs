use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::remote::api_types::{string_or_null, text_or_number};
use crate::repository::{require, require_unique, Entity, Rejection};

/// Enrollment status assumed when none is given
pub const DEFAULT_STATUS: &str = "ativo";

/// Degree course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Course {
  #[serde(rename = "Engenharia da Computação")]
  ComputerEngineering,
  #[serde(rename = "Direito")]
  Law,
  #[serde(rename = "Medicina")]
  Medicine,
  #[serde(rename = "Administração")]
  Business,
  #[serde(rename = "Psicologia")]
  Psychology,
  #[serde(rename = "Arquitetura")]
  Architecture,
}

impl Course {
  pub const ALL: [Course; 6] = [
    Course::ComputerEngineering,
    Course::Law,
    Course::Medicine,
    Course::Business,
    Course::Psychology,
    Course::Architecture,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::ComputerEngineering => "Engenharia da Computação",
      Self::Law => "Direito",
      Self::Medicine => "Medicina",
      Self::Business => "Administração",
      Self::Psychology => "Psicologia",
      Self::Architecture => "Arquitetura",
    }
  }

  pub fn from_label(label: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|c| c.as_str() == label.trim())
  }
}

fn lenient_course<'de, D>(deserializer: D) -> Result<Option<Course>, D::Error>
where
  D: Deserializer<'de>,
{
  let label = Option::<String>::deserialize(deserializer)?;
  Ok(label.as_deref().and_then(Course::from_label))
}

fn default_status() -> String {
  DEFAULT_STATUS.to_string()
}

/// Enrolled student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub email: String,
  /// Matrícula
  #[serde(default)]
  pub registration_number: String,
  #[serde(default)]
  pub course: Option<Course>,
  /// Stored as entered; see [`Student::display_phone`]
  #[serde(default)]
  pub phone: String,
  #[serde(default)]
  pub registered_at: Option<DateTime<Utc>>,
  #[serde(default = "default_status")]
  pub status: String,
  /// Backend document version
  #[serde(default)]
  pub version: u32,
}

impl Student {
  /// Phone formatted as `(dd) dddd-dddd` or `(dd) ddddd-dddd`.
  ///
  /// Numbers that do not have 10 or 11 digits are returned as entered.
  pub fn display_phone(&self) -> String {
    format_phone(&self.phone)
  }
}

fn format_phone(raw: &str) -> String {
  let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
  match digits.len() {
    10 => format!("({}) {}-{}", &digits[..2], &digits[2..6], &digits[6..]),
    11 => format!("({}) {}-{}", &digits[..2], &digits[2..7], &digits[7..]),
    _ => raw.to_string(),
  }
}

/// Minimal structural check: `local@domain.tld`, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
  let Some((local, domain)) = email.split_once('@') else {
    return false;
  };

  !local.is_empty()
    && !domain.contains('@')
    && !email.chars().any(char::is_whitespace)
    && domain.contains('.')
    && !domain.starts_with('.')
    && !domain.ends_with('.')
}

/// Next sequential registration number after the highest numeric one in
/// `existing`. The first number of an empty collection is `<year>0001`.
///
/// If that number cannot be incremented, the first unused `<year>NNNN` number
/// is used instead.
pub fn next_registration_number(existing: &[Student]) -> String {
  let numbers: Vec<u64> = existing
    .iter()
    .filter_map(|s| s.registration_number.parse::<u64>().ok())
    .collect();

  match numbers.iter().max() {
    None => format!("{}{:04}", Utc::now().year(), 1),
    Some(n) => match n.checked_add(1) {
      Some(next) => next.to_string(),
      None => next_in_year(&numbers),
    },
  }
}

fn next_in_year(numbers: &[u64]) -> String {
  let year = u64::try_from(Utc::now().year()).unwrap_or_default();
  let first = year * 10_000 + 1;
  let last = year * 10_000 + 9_999;

  (first..=last)
    .find(|candidate| !numbers.contains(candidate))
    .map(|n| n.to_string())
    .unwrap_or_else(|| format!("{}{}", year, numbers.len() + 1))
}

/// New student, in backend wire format
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewStudent {
  #[serde(rename = "nome")]
  pub name: String,
  pub email: String,
  /// Left empty for the backend (or the local store) to assign
  #[serde(rename = "matricula", skip_serializing_if = "String::is_empty")]
  pub registration_number: String,
  #[serde(rename = "curso")]
  pub course: Option<Course>,
  #[serde(rename = "telefone")]
  pub phone: String,
  pub status: String,
}

impl NewStudent {
  pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      email: email.into(),
      status: default_status(),
      ..Default::default()
    }
  }

  pub fn registration_number(mut self, number: impl Into<String>) -> Self {
    self.registration_number = number.into();
    self
  }

  pub fn course(mut self, course: Course) -> Self {
    self.course = Some(course);
    self
  }

  pub fn phone(mut self, phone: impl Into<String>) -> Self {
    self.phone = phone.into();
    self
  }
}

/// Partial student update, in backend wire format.
///
/// The registration number is not updatable.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StudentPatch {
  #[serde(rename = "nome", skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(rename = "curso", skip_serializing_if = "Option::is_none")]
  pub course: Option<Course>,
  #[serde(rename = "telefone", skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
}

/// Student as the backend returns it
#[derive(Debug, Deserialize)]
pub struct ApiStudent {
  #[serde(rename = "_id", alias = "id")]
  pub id: String,
  #[serde(rename = "nome", default, deserialize_with = "string_or_null")]
  pub name: String,
  #[serde(default, deserialize_with = "string_or_null")]
  pub email: String,
  #[serde(rename = "matricula", default, deserialize_with = "text_or_number")]
  pub registration_number: String,
  #[serde(rename = "curso", default, deserialize_with = "lenient_course")]
  pub course: Option<Course>,
  #[serde(rename = "telefone", default, deserialize_with = "string_or_null")]
  pub phone: String,
  #[serde(rename = "dataCadastro", default)]
  pub registered_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(rename = "__v", default)]
  pub version: u32,
}

impl From<ApiStudent> for Student {
  fn from(s: ApiStudent) -> Self {
    Student {
      id: s.id,
      name: s.name,
      email: s.email,
      registration_number: s.registration_number,
      course: s.course,
      phone: s.phone,
      registered_at: s.registered_at,
      status: s
        .status
        .filter(|st| !st.is_empty())
        .unwrap_or_else(default_status),
      version: s.version,
    }
  }
}

impl Entity for Student {
  type Draft = NewStudent;
  type Patch = StudentPatch;
  type Remote = ApiStudent;

  fn entity_type() -> &'static str {
    "student"
  }

  fn storage_key() -> &'static str {
    "alunos_biblioteca"
  }

  fn id(&self) -> &str {
    &self.id
  }

  fn validate(draft: &NewStudent, existing: &[Self]) -> Result<(), Rejection> {
    require("name", &draft.name)?;
    require_unique("name", &draft.name, existing, |s| s.name.as_str())?;
    if !draft.registration_number.is_empty() {
      require_unique(
        "registration number",
        &draft.registration_number,
        existing,
        |s| s.registration_number.as_str(),
      )?;
    }
    if !draft.email.is_empty() && !is_valid_email(&draft.email) {
      return Err(Rejection::Invalid {
        field: "email",
        value: draft.email.clone(),
      });
    }
    Ok(())
  }

  fn from_draft(id: String, draft: NewStudent, existing: &[Self]) -> Self {
    let registration_number = if draft.registration_number.is_empty() {
      next_registration_number(existing)
    } else {
      draft.registration_number
    };

    Student {
      id,
      name: draft.name,
      email: draft.email,
      registration_number,
      course: draft.course,
      phone: draft.phone,
      registered_at: Some(Utc::now()),
      status: if draft.status.is_empty() {
        default_status()
      } else {
        draft.status
      },
      version: 0,
    }
  }

  fn to_draft(&self) -> NewStudent {
    NewStudent {
      name: self.name.clone(),
      email: self.email.clone(),
      registration_number: self.registration_number.clone(),
      course: self.course,
      phone: self.phone.clone(),
      status: self.status.clone(),
    }
  }

  fn apply_patch(&mut self, patch: &StudentPatch) {
    if let Some(name) = &patch.name {
      self.name = name.clone();
    }
    if let Some(email) = &patch.email {
      self.email = email.clone();
    }
    if let Some(course) = patch.course {
      self.course = Some(course);
    }
    if let Some(phone) = &patch.phone {
      self.phone = phone.clone();
    }
    if let Some(status) = &patch.status {
      self.status = status.clone();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn student(name: &str, number: &str) -> Student {
    Student::from_draft(
      format!("id-{}", number),
      NewStudent::new(name, "aluno@uni.br").registration_number(number),
      &[],
    )
  }

  #[test]
  fn test_maps_backend_student() {
    let api: ApiStudent = serde_json::from_value(json!({
      "_id": "s1",
      "nome": "Ana Souza",
      "email": "ana@uni.br",
      "matricula": 20230001,
      "curso": "Direito",
      "telefone": "11987654321",
      "dataCadastro": "2024-02-01T10:00:00.000Z",
      "__v": 2
    }))
    .unwrap();

    let s = Student::from(api);
    assert_eq!(s.id, "s1");
    assert_eq!(s.registration_number, "20230001");
    assert_eq!(s.course, Some(Course::Law));
    assert_eq!(s.status, DEFAULT_STATUS);
    assert_eq!(s.version, 2);
    assert!(s.registered_at.is_some());
  }

  #[test]
  fn test_display_phone() {
    let mut s = student("Ana", "1");
    s.phone = "11987654321".into();
    assert_eq!(s.display_phone(), "(11) 98765-4321");
    s.phone = "(21) 3456-7890".into();
    assert_eq!(s.display_phone(), "(21) 3456-7890");
    s.phone = "2134567890".into();
    assert_eq!(s.display_phone(), "(21) 3456-7890");
    s.phone = "ramal 12".into();
    assert_eq!(s.display_phone(), "ramal 12");
  }

  #[test]
  fn test_email_validation() {
    assert!(is_valid_email("ana@uni.br"));
    assert!(!is_valid_email("ana.uni.br"));
    assert!(!is_valid_email("ana@uni"));
    assert!(!is_valid_email("@uni.br"));
    assert!(!is_valid_email("ana @uni.br"));
    assert!(!is_valid_email("ana@@uni.br"));
  }

  #[test]
  fn test_invalid_email_rejected() {
    let err = Student::validate(&NewStudent::new("Ana", "ana-at-uni"), &[]).unwrap_err();
    assert!(matches!(err, Rejection::Invalid { field: "email", .. }));
  }

  #[test]
  fn test_duplicate_name_and_registration_rejected() {
    let existing = vec![student("Ana", "20230001")];

    let by_name = Student::validate(&NewStudent::new("Ana", "a@b.co"), &existing).unwrap_err();
    assert!(matches!(by_name, Rejection::Duplicate { field: "name", .. }));

    let by_number = Student::validate(
      &NewStudent::new("Bia", "b@b.co").registration_number("20230001"),
      &existing,
    )
    .unwrap_err();
    assert!(matches!(
      by_number,
      Rejection::Duplicate {
        field: "registration number",
        ..
      }
    ));
  }

  #[test]
  fn test_local_registration_numbers_are_sequential() {
    let existing = vec![student("Ana", "20230001"), student("Bia", "20230007")];
    let next = Student::from_draft("local_1_a".into(), NewStudent::new("Caio", ""), &existing);
    assert_eq!(next.registration_number, "20230008");
  }

  #[test]
  fn test_max_registration_number_does_not_overflow() {
    let year = Utc::now().year();
    let existing = vec![
      student("Ana", &u64::MAX.to_string()),
      student("Bia", &format!("{}0001", year)),
    ];
    assert_eq!(next_registration_number(&existing), format!("{}0002", year));
  }

  #[test]
  fn test_first_registration_number_uses_year() {
    let number = next_registration_number(&[]);
    assert_eq!(number, format!("{}0001", Utc::now().year()));
  }

  #[test]
  fn test_draft_omits_unassigned_registration() {
    let wire = serde_json::to_value(NewStudent::new("Ana", "ana@uni.br").course(Course::Medicine))
      .unwrap();
    assert!(wire.get("matricula").is_none());
    assert_eq!(wire["curso"], "Medicina");
    assert_eq!(wire["status"], DEFAULT_STATUS);
  }

  #[test]
  fn test_to_draft_strips_client_fields() {
    let mut s = student("Ana", "20230001");
    s.version = 3;
    let wire = serde_json::to_value(s.to_draft()).unwrap();
    assert!(wire.get("id").is_none());
    assert!(wire.get("__v").is_none());
    assert!(wire.get("version").is_none());
    assert_eq!(wire["matricula"], "20230001");
  }
}
