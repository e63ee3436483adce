//! Remote gateway error types.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type for gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Ways a call to the REST backend can fail.
#[derive(Debug, Error)]
pub enum GatewayError {
  #[error("request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("backend responded with {status}: {body}")]
  Status { status: StatusCode, body: String },

  #[error("record not found")]
  NotFound,

  #[error("backend rejected the request: {0}")]
  Rejected(String),

  #[error("malformed response: {0}")]
  Decode(#[from] serde_json::Error),

  #[error("invalid endpoint url: {0}")]
  Url(String),
}

impl GatewayError {
  /// Returns true when the backend answered that the record does not exist.
  ///
  /// This is the only failure that does not mark the backend unreachable.
  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound)
  }
}
