//! Role validation as an ordered pipeline of independent validators.
//!
//! Every validator looks at one candidate role against a [`Snapshot`] that
//! already reflects the change being made, and reports problems as data.
//! Nothing here returns `Err`; callers decide whether a non-empty list
//! blocks a commit.

mod age;
mod coverage;
mod family;
mod overlap;
mod period;

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub use age::AgeValidator;
pub use coverage::CoverageValidator;
pub use family::FamilyValidator;
pub use overlap::OverlapValidator;
pub use period::PeriodValidator;

use crate::{config::Thresholds, role::Role, snapshot::Snapshot};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// The input a validation error is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
  StartOn,
  EndOn,
  Person,
  Group,
  Category,
  Role,
  Base,
}

impl fmt::Display for Field {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::StartOn => "start_on",
      Self::EndOn => "end_on",
      Self::Person => "person",
      Self::Group => "group",
      Self::Category => "category",
      Self::Role => "role",
      Self::Base => "base",
    };
    f.write_str(name)
  }
}

/// Message key plus parameters. `Display` renders the user-facing text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "key", rename_all = "snake_case")]
pub enum ErrorKey {
  #[error("overlaps membership {role_id} from {start_on} to {end_on}")]
  OverlapsMembership {
    role_id:  Uuid,
    start_on: NaiveDate,
    end_on:   NaiveDate,
  },

  #[error("overlaps pending registration {role_id} from {start_on} to {end_on}")]
  OverlapsPendingRegistration {
    role_id:  Uuid,
    start_on: NaiveDate,
    end_on:   NaiveDate,
  },

  #[error("is not covered by a primary membership")]
  NotCoveredByPrimary,

  #[error("too many adults in family, max {max}")]
  TooManyAdultsInFamily { max: usize },

  #[error("family membership must be in group {expected}")]
  FamilySectionMismatch { expected: Uuid },

  #[error("birthday is required")]
  BirthdayMissing,

  #[error("must be at least {minimum_age} years old")]
  TooYoung { minimum_age: u32 },

  #[error("must be present")]
  DateMissing,

  #[error("must not be before the start")]
  EndsBeforeStart,

  #[error("is required for memberships")]
  CategoryMissing,

  #[error("has no active primary membership")]
  NoActivePrimary,

  #[error("primary membership is terminated")]
  PrimaryTerminated,

  #[error("is already the primary section")]
  SameSection,

  #[error("already has a role in this section")]
  AlreadyInSection,

  #[error("is not a primary membership")]
  NotPrimary,

  #[error("is not a secondary membership")]
  NotSecondary,

  #[error("is not active")]
  NotActive,

  #[error("is already terminated")]
  AlreadyTerminated,

  #[error("is not terminated")]
  NotTerminated,

  #[error("is not a pending registration")]
  NotPending,

  #[error("is already a family membership")]
  AlreadyFamily,

  #[error("requires a family primary membership")]
  FamilyPrimaryRequired,

  #[error("lies before the start of the role")]
  TerminationBeforeStart,

  #[error("is not part of a household")]
  NoHousehold,

  #[error("is already part of this household")]
  AlreadyInHousehold,

  #[error("must be today or later")]
  StartInPast,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
  pub field: Field,
  #[serde(flatten)]
  pub key:   ErrorKey,
}

impl ValidationError {
  pub fn new(field: Field, key: ErrorKey) -> Self { Self { field, key } }
}

impl fmt::Display for ValidationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.field, self.key)
  }
}

/// An ordered, possibly empty, list of validation errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
  pub fn new() -> Self { Self::default() }

  pub fn add(&mut self, field: Field, key: ErrorKey) {
    self.0.push(ValidationError::new(field, key));
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn iter(&self) -> impl Iterator<Item = &ValidationError> { self.0.iter() }

  pub fn contains(&self, key: &ErrorKey) -> bool {
    self.0.iter().any(|e| &e.key == key)
  }

  /// Errors scoped to `field`.
  pub fn on(&self, field: Field) -> impl Iterator<Item = &ValidationError> {
    self.0.iter().filter(move |e| e.field == field)
  }

  /// `Ok(())` when empty, otherwise the list itself as the error.
  pub fn into_result(self) -> Result<(), ValidationErrors> {
    if self.is_empty() { Ok(()) } else { Err(self) }
  }
}

impl Extend<ValidationError> for ValidationErrors {
  fn extend<T: IntoIterator<Item = ValidationError>>(&mut self, iter: T) {
    self.0.extend(iter);
  }
}

impl IntoIterator for ValidationErrors {
  type Item = ValidationError;
  type IntoIter = std::vec::IntoIter<ValidationError>;

  fn into_iter(self) -> Self::IntoIter { self.0.into_iter() }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, e) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str("; ")?;
      }
      write!(f, "{e}")?;
    }
    Ok(())
  }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// Everything a validator may consult besides the candidate itself.
pub struct ValidationContext<'a> {
  /// The role set as it would look after the change, candidate included.
  pub snapshot:   &'a Snapshot,
  pub today:      NaiveDate,
  pub thresholds: &'a Thresholds,
}

pub trait Validator: Send + Sync {
  fn validate(&self, candidate: &Role, ctx: &ValidationContext<'_>) -> Vec<ValidationError>;
}

/// Whether household rules apply. Historical imports may already violate
/// the family rules, so the import layer can opt out of them explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationMode {
  #[default]
  Standard,
  /// Skips family cardinality and family section homogeneity.
  Import,
}

pub struct Pipeline {
  validators: Vec<Box<dyn Validator>>,
}

impl Pipeline {
  /// Every rule, in reporting order.
  pub fn standard() -> Self {
    Self {
      validators: vec![
        Box::new(PeriodValidator),
        Box::new(OverlapValidator),
        Box::new(CoverageValidator),
        Box::new(AgeValidator),
        Box::new(FamilyValidator),
      ],
    }
  }

  /// Every rule except the household ones.
  pub fn import() -> Self {
    Self {
      validators: vec![
        Box::new(PeriodValidator),
        Box::new(OverlapValidator),
        Box::new(CoverageValidator),
        Box::new(AgeValidator),
      ],
    }
  }

  /// Only the interval rules; used when an existing role merely changes its
  /// dates (termination, undo).
  pub fn temporal() -> Self {
    Self {
      validators: vec![
        Box::new(PeriodValidator),
        Box::new(OverlapValidator),
        Box::new(CoverageValidator),
      ],
    }
  }

  pub fn for_mode(mode: ValidationMode) -> Self {
    match mode {
      ValidationMode::Standard => Self::standard(),
      ValidationMode::Import => Self::import(),
    }
  }

  pub fn run(&self, candidate: &Role, ctx: &ValidationContext<'_>) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for validator in &self.validators {
      errors.extend(validator.validate(candidate, ctx));
    }
    errors
  }
}

/// Run the standard pipeline over every live role of `person_id`.
pub fn audit(
  person_id: Uuid,
  ctx: &ValidationContext<'_>,
) -> Vec<(Uuid, ValidationError)> {
  let pipeline = Pipeline::standard();
  ctx
    .snapshot
    .roles_of(person_id)
    .filter(|r| !r.is_deleted())
    .flat_map(|role| {
      pipeline
        .run(role, ctx)
        .into_iter()
        .map(|e| (role.role_id, e))
        .collect::<Vec<_>>()
    })
    .collect()
}
