use crate::role::Role;

use super::{ErrorKey, Field, ValidationContext, ValidationError, Validator};

/// Membership roles need both dates, a category, and a non-inverted period.
pub struct PeriodValidator;

impl Validator for PeriodValidator {
  fn validate(&self, candidate: &Role, _ctx: &ValidationContext<'_>) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if !candidate.kind.is_membership() {
      return errors;
    }
    if candidate.start_on.is_none() {
      errors.push(ValidationError::new(Field::StartOn, ErrorKey::DateMissing));
    }
    if candidate.end_on.is_none() {
      errors.push(ValidationError::new(Field::EndOn, ErrorKey::DateMissing));
    }
    if let (Some(start), Some(end)) = (candidate.start_on, candidate.end_on)
      && end < start
    {
      errors.push(ValidationError::new(Field::EndOn, ErrorKey::EndsBeforeStart));
    }
    if candidate.category.is_none() {
      errors.push(ValidationError::new(Field::Category, ErrorKey::CategoryMissing));
    }
    errors
  }
}
