use uuid::Uuid;

use super::{Context, Operation, Scope};
use crate::{
  Result,
  household,
  notify::{Event, Notification},
  role::{NewRole, Role, end_of_year},
  snapshot::ChangeSet,
  validation::{ErrorKey, Field, ValidationErrors},
};

/// Approve a pending registration: the registration is replaced by a
/// membership running until the end of the current year. Family
/// registrations are approved for the whole household at once.
#[derive(Debug, Clone)]
pub struct PromotePendingRegistration {
  pub role_id: Uuid,
}

impl PromotePendingRegistration {
  pub fn new(role_id: Uuid) -> Self { Self { role_id } }
}

impl Operation for PromotePendingRegistration {
  fn scope(&self) -> Scope { Scope::Role(self.role_id) }

  fn plan(&self, ctx: &Context<'_>) -> Result<ChangeSet> {
    let role = ctx.role(self.role_id)?;

    let mut errors = ValidationErrors::new();
    let promoted = role.kind.promoted();
    if promoted.is_none() {
      errors.add(Field::Role, ErrorKey::NotPending);
    } else if role.is_deleted() || role.is_ended(ctx.today) {
      errors.add(Field::Role, ErrorKey::NotActive);
    }
    errors.into_result()?;
    let Some(kind) = promoted else { return Ok(ctx.change_set()) };

    let mut pending: Vec<&Role> = vec![role];
    if role.is_family() {
      pending.extend(household::household_counterparts(ctx.snapshot, role, ctx.today));
    }

    let end_on = end_of_year(ctx.today);
    let start_on = ctx.today.min(end_on);
    let mut changes = ctx.change_set();
    for registration in pending {
      household::destroy_one(&mut changes, registration, ctx.today, ctx.now, false);
      changes.create(
        NewRole {
          person_id: registration.person_id,
          group_id:  registration.group_id,
          kind,
          category:  registration.category,
          start_on:  Some(start_on),
          end_on:    Some(end_on),
        }
        .build(registration.layer_id, ctx.now),
      );
      changes.notify(Notification::new(
        Event::RegistrationConfirmed,
        registration.person_id,
        registration.group_id,
        start_on,
      ));
    }
    Ok(changes)
  }
}
