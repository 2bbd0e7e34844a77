use std::collections::BTreeSet;

use crate::role::Role;

use super::{ErrorKey, Field, ValidationContext, ValidationError, Validator};

/// Household rules for family-category memberships.
///
/// - At most `max_family_adults` distinct adults of one household may hold
///   family memberships over overlapping periods.
/// - All family primary memberships of a household live in the same group.
pub struct FamilyValidator;

impl Validator for FamilyValidator {
  fn validate(&self, candidate: &Role, ctx: &ValidationContext<'_>) -> Vec<ValidationError> {
    if !candidate.is_family() || !candidate.kind.is_membership() {
      return Vec::new();
    }
    let Some(person) = ctx.snapshot.person(candidate.person_id) else {
      return Vec::new();
    };
    let Some(period) = candidate.active_period() else {
      return Vec::new();
    };

    let mut errors = Vec::new();
    let adult_age = ctx.thresholds.adult_age;
    let is_adult = |p: &crate::person::Person| {
      p.years_on(ctx.today).is_some_and(|age| age >= adult_age)
    };

    let family_roles_of_others: Vec<&Role> = ctx
      .snapshot
      .household_of(person)
      .filter(|member| member.person_id != person.person_id)
      .flat_map(|member| ctx.snapshot.roles_of(member.person_id))
      .filter(|r| r.is_family() && r.kind.is_membership() && !r.is_deleted())
      .filter(|r| r.active_period().is_some_and(|p| p.overlaps(&period)))
      .collect();

    if is_adult(person) {
      let other_adults: BTreeSet<_> = family_roles_of_others
        .iter()
        .filter(|r| ctx.snapshot.person(r.person_id).is_some_and(is_adult))
        .map(|r| r.person_id)
        .collect();
      let max = ctx.thresholds.max_family_adults;
      if other_adults.len() + 1 > max {
        errors.push(ValidationError::new(
          Field::Person,
          ErrorKey::TooManyAdultsInFamily { max },
        ));
      }
    }

    if candidate.is_primary()
      && let Some(other) = family_roles_of_others
        .iter()
        .find(|r| r.is_primary() && r.group_id != candidate.group_id)
    {
      errors.push(ValidationError::new(
        Field::Group,
        ErrorKey::FamilySectionMismatch { expected: other.group_id },
      ));
    }

    errors
  }
}
