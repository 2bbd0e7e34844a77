use crate::role::{DateRange, Role};

use super::{ErrorKey, Field, ValidationContext, ValidationError, Validator};

/// A secondary role must lie within a single primary role of its person.
///
/// Checked from both sides: a secondary candidate must be covered, and a
/// primary candidate must not leave any of the person's live secondary
/// roles uncovered (e.g. after its end date was moved forward).
pub struct CoverageValidator;

impl Validator for CoverageValidator {
  fn validate(&self, candidate: &Role, ctx: &ValidationContext<'_>) -> Vec<ValidationError> {
    if candidate.is_secondary() {
      let Some(period) = candidate.active_period() else {
        return Vec::new();
      };
      if covered(&period, candidate, ctx) {
        return Vec::new();
      }
      return vec![ValidationError::new(
        Field::StartOn,
        ErrorKey::NotCoveredByPrimary,
      )];
    }

    if candidate.is_primary() {
      let uncovered = ctx
        .snapshot
        .roles_of(candidate.person_id)
        .filter(|r| r.is_secondary() && !r.is_deleted())
        .filter_map(|r| r.active_period().map(|p| (r, p)))
        .any(|(r, p)| !covered(&p, r, ctx));
      if uncovered {
        return vec![ValidationError::new(
          Field::EndOn,
          ErrorKey::NotCoveredByPrimary,
        )];
      }
    }

    Vec::new()
  }
}

/// A soft deleted primary still covers the days it was held: destroying a
/// started role ends it yesterday, so once it has ended its period is history.
fn covered(period: &DateRange, secondary: &Role, ctx: &ValidationContext<'_>) -> bool {
  ctx
    .snapshot
    .roles_of(secondary.person_id)
    .filter(|r| r.is_primary() && (!r.is_deleted() || r.is_ended(ctx.today)))
    .filter_map(Role::active_period)
    .any(|p| p.covers(period))
}
