use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `backend.url`
pub const BACKEND_URL_ENV: &str = "BIBSYNC_BACKEND_URL";

const DEFAULT_BACKEND_URL: &str = "https://sistema-de-biblioteca-universitaria.onrender.com/api";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub backend: BackendConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
  /// Base URL; each collection lives at `<url>/<collection>`
  pub url: String,
  /// Per-request timeout
  pub timeout_secs: u64,
  pub collections: CollectionsConfig,
}

impl Default for BackendConfig {
  fn default() -> Self {
    Self {
      url: DEFAULT_BACKEND_URL.to_string(),
      timeout_secs: 10,
      collections: CollectionsConfig::default(),
    }
  }
}

impl BackendConfig {
  /// Build the HTTP client shared by every collection.
  pub fn http_client(&self) -> Result<reqwest::Client> {
    reqwest::Client::builder()
      .timeout(Duration::from_secs(self.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))
  }
}

/// Collection path segments on the backend
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectionsConfig {
  pub authors: String,
  pub books: String,
  pub students: String,
  pub loans: String,
  /// Action segment for returning a loan (`PATCH <loans>/<id>/<action>`)
  pub loan_return: String,
}

impl Default for CollectionsConfig {
  fn default() -> Self {
    Self {
      authors: "autores".to_string(),
      books: "livros".to_string(),
      students: "alunos".to_string(),
      loans: "emprestimos".to_string(),
      loan_return: "devolver".to_string(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// SQLite file for the local store (defaults to the user data directory)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Filter directive used when `RUST_LOG` is unset
  pub level: String,
  /// Write daily log files here instead of stderr
  pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      directory: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./bibsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/bibsync/config.yaml
  ///
  /// Built-in defaults are used when no file exists. `BIBSYNC_BACKEND_URL`
  /// takes precedence over the configured backend URL.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
      if !url.trim().is_empty() {
        config.backend.url = url;
      }
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("bibsync.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("bibsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.backend.url, DEFAULT_BACKEND_URL);
    assert_eq!(config.backend.timeout_secs, 10);
    assert_eq!(config.backend.collections.loans, "emprestimos");
    assert_eq!(config.backend.collections.loan_return, "devolver");
    assert!(config.storage.path.is_none());
    assert_eq!(config.logging.level, "info");
  }

  #[test]
  fn test_partial_file_keeps_defaults() {
    let config = Config::parse(
      "backend:\n  url: http://localhost:3000/api\n  collections:\n    students: usuarios\n",
    )
    .unwrap();
    assert_eq!(config.backend.url, "http://localhost:3000/api");
    assert_eq!(config.backend.timeout_secs, 10);
    assert_eq!(config.backend.collections.students, "usuarios");
    assert_eq!(config.backend.collections.books, "livros");
  }

  #[test]
  fn test_empty_file_is_default() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.backend.url, DEFAULT_BACKEND_URL);
  }

  #[test]
  fn test_load_explicit_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "storage:\n  path: /tmp/bibsync-test.db\nlogging:\n  level: debug").unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(
      config.storage.path.as_deref(),
      Some(Path::new("/tmp/bibsync-test.db"))
    );
    assert_eq!(config.logging.level, "debug");
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    assert!(Config::load(Some(Path::new("/nonexistent/bibsync.yaml"))).is_err());
  }

  #[test]
  fn test_invalid_yaml_is_an_error() {
    assert!(Config::parse("backend: [").is_err());
  }

  #[test]
  fn test_http_client_builds() {
    assert!(BackendConfig::default().http_client().is_ok());
  }
}
