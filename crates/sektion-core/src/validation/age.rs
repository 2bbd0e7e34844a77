use crate::role::Role;

use super::{ErrorKey, Field, ValidationContext, ValidationError, Validator};

/// Membership holders need a known birthday and the minimum age on the
/// first day of the role.
pub struct AgeValidator;

impl Validator for AgeValidator {
  fn validate(&self, candidate: &Role, ctx: &ValidationContext<'_>) -> Vec<ValidationError> {
    if !candidate.kind.is_membership() {
      return Vec::new();
    }
    let Some(person) = ctx.snapshot.person(candidate.person_id) else {
      return Vec::new();
    };
    let on = candidate.start_on.unwrap_or(ctx.today).max(ctx.today);
    let minimum_age = ctx.thresholds.minimum_age;

    match person.years_on(on) {
      None => vec![ValidationError::new(Field::Person, ErrorKey::BirthdayMissing)],
      Some(age) if age < minimum_age => vec![ValidationError::new(
        Field::Person,
        ErrorKey::TooYoung { minimum_age },
      )],
      Some(_) => Vec::new(),
    }
  }
}
