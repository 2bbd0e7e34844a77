//! Error type for `sektion-store-sqlite`.

use sektion_core::validation::ValidationErrors;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] sektion_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A column held a value the domain types cannot represent.
  #[error("decode error: {0}")]
  Decode(String),
}

impl Error {
  /// The validation errors, if the operation was rejected as invalid.
  pub fn validation(&self) -> Option<&ValidationErrors> {
    match self {
      Self::Core(sektion_core::Error::Invalid(errors)) => Some(errors),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
