//! Error types for `sektion-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::validation::ValidationErrors;

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {0}")]
  Invalid(ValidationErrors),

  /// More than one distinct group carries family primary memberships in a
  /// single household.
  #[error("household {household:?} has family memberships in several groups: {groups:?}")]
  AmbiguousFamilySection { household: String, groups: Vec<Uuid> },

  #[error("termination of role {0} cannot be traced to a mutation")]
  MutationNotFound(Uuid),

  #[error("person not found: {0}")]
  PersonNotFound(Uuid),

  #[error("role not found: {0}")]
  RoleNotFound(Uuid),

  #[error("group not found: {0}")]
  GroupNotFound(Uuid),
}

impl From<ValidationErrors> for Error {
  fn from(errors: ValidationErrors) -> Self { Self::Invalid(errors) }
}

impl Error {
  /// Data-integrity failures are for operators, not end users.
  pub fn is_integrity(&self) -> bool {
    matches!(
      self,
      Self::AmbiguousFamilySection { .. } | Self::MutationNotFound(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
