use crate::role::Role;

use super::{ErrorKey, Field, ValidationContext, ValidationError, Validator};

/// Primary roles are exclusive club-wide; membership roles are exclusive
/// per layer.
///
/// Deleted roles never conflict. Ended and future roles do. Each conflicting
/// role is reported once, even when it violates both rules.
pub struct OverlapValidator;

impl Validator for OverlapValidator {
  fn validate(&self, candidate: &Role, ctx: &ValidationContext<'_>) -> Vec<ValidationError> {
    if !candidate.kind.is_membership() {
      return Vec::new();
    }
    let Some(period) = candidate.active_period() else {
      return Vec::new();
    };

    ctx
      .snapshot
      .roles_of(candidate.person_id)
      .filter(|other| other.role_id != candidate.role_id && !other.is_deleted())
      .filter(|other| {
        let both_primary = candidate.is_primary() && other.is_primary();
        let same_layer =
          other.kind.is_membership() && other.layer_id == candidate.layer_id;
        both_primary || same_layer
      })
      .filter_map(|other| {
        let other_period = other.active_period()?;
        if !period.overlaps(&other_period) {
          return None;
        }
        let key = if other.kind.is_pending() {
          ErrorKey::OverlapsPendingRegistration {
            role_id:  other.role_id,
            start_on: other_period.start,
            end_on:   other_period.end,
          }
        } else {
          ErrorKey::OverlapsMembership {
            role_id:  other.role_id,
            start_on: other_period.start,
            end_on:   other_period.end,
          }
        };
        Some(ValidationError::new(Field::StartOn, key))
      })
      .collect()
  }
}
