use uuid::Uuid;

use super::{Context, Operation, Scope, invalid};
use crate::{
  Result,
  household::{self, DestroyOptions},
  notify::{Event, Notification},
  role::NewRole,
  snapshot::ChangeSet,
  validation::{ErrorKey, Field, ValidationMode},
};

/// Create a single role.
///
/// In standard mode a new family primary membership is handed to the rest
/// of the household. [`ValidationMode::Import`] is the narrow escape hatch
/// for historical data: household rules are not checked and nothing is
/// propagated.
#[derive(Debug, Clone)]
pub struct CreateRole {
  pub role: NewRole,
  pub mode: ValidationMode,
}

impl CreateRole {
  pub fn new(role: NewRole) -> Self { Self { role, mode: ValidationMode::Standard } }

  pub fn import(role: NewRole) -> Self { Self { role, mode: ValidationMode::Import } }
}

impl Operation for CreateRole {
  fn scope(&self) -> Scope { Scope::Person(self.role.person_id) }

  fn validation_mode(&self) -> ValidationMode { self.mode }

  fn plan(&self, ctx: &Context<'_>) -> Result<ChangeSet> {
    let person = ctx.person(self.role.person_id)?;
    let group = ctx.snapshot.require_group(self.role.group_id)?;
    let role = self.role.clone().build(group.layer_id, ctx.now);
    let mut changes = ctx.change_set();

    if role.kind.is_membership() {
      changes.notify(Notification::new(
        Event::MembershipCreated,
        role.person_id,
        role.group_id,
        role.start_on.unwrap_or(ctx.today),
      ));
    }
    let propagates = self.mode == ValidationMode::Standard && role.is_primary() && role.is_family();
    changes.create(role);

    if propagates && let Some(key) = person.household_key.as_deref() {
      // A role in another section is left for validation to report.
      let existing = household::family_primary_roles(ctx.snapshot, key, ctx.today)?;
      if existing.iter().all(|r| r.group_id == group.group_id) {
        household::ensure_main_person(ctx.snapshot, &mut changes, key, person.person_id);
        household::propagate(ctx.snapshot, &mut changes, key, ctx.today, ctx.now, ctx.thresholds)?;
      }
    }
    Ok(changes)
  }
}

/// Destroy a role together with the roles that depend on it.
#[derive(Debug, Clone)]
pub struct RemoveRole {
  pub role_id: Uuid,
  pub options: DestroyOptions,
}

impl RemoveRole {
  pub fn new(role_id: Uuid) -> Self { Self { role_id, options: DestroyOptions::default() } }
}

impl Operation for RemoveRole {
  fn scope(&self) -> Scope { Scope::Role(self.role_id) }

  fn plan(&self, ctx: &Context<'_>) -> Result<ChangeSet> {
    let role = ctx.role(self.role_id)?;
    if role.is_deleted() {
      return Err(invalid(Field::Role, ErrorKey::NotActive));
    }
    let mut changes = ctx.change_set();
    household::destroy(ctx.snapshot, &mut changes, role, self.options, ctx.today, ctx.now);
    Ok(changes)
  }
}
