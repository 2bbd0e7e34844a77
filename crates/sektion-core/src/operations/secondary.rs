use uuid::Uuid;

use super::{
  Context, Operation, Scope,
  terminate::{TerminateOn, end_role},
};
use crate::{
  Result,
  household,
  notify::{Event, Notification},
  role::{Category, NewRole, RoleKind, end_of_year},
  snapshot::ChangeSet,
  validation::{ErrorKey, Field, ValidationErrors},
};

/// Join an additional section. Sections requiring approval get a pending
/// registration instead of a membership.
#[derive(Debug, Clone)]
pub struct JoinSecondarySection {
  pub person_id:          Uuid,
  pub target_group_id:    Uuid,
  /// Join on behalf of the whole family membership.
  pub register_as_family: bool,
}

impl JoinSecondarySection {
  pub fn new(person_id: Uuid, target_group_id: Uuid) -> Self {
    Self { person_id, target_group_id, register_as_family: false }
  }

  pub fn as_family(mut self) -> Self {
    self.register_as_family = true;
    self
  }
}

impl Operation for JoinSecondarySection {
  fn scope(&self) -> Scope { Scope::Person(self.person_id) }

  fn plan(&self, ctx: &Context<'_>) -> Result<ChangeSet> {
    let person = ctx.person(self.person_id)?;
    let target = ctx.snapshot.require_group(self.target_group_id)?;

    let mut errors = ValidationErrors::new();
    let primary = ctx.active_primary(person.person_id);
    match primary {
      None => errors.add(Field::Person, ErrorKey::NoActivePrimary),
      Some(p) if p.is_terminated() => errors.add(Field::Person, ErrorKey::PrimaryTerminated),
      Some(p) if p.layer_id == target.layer_id => errors.add(Field::Group, ErrorKey::SameSection),
      Some(p) if self.register_as_family && !p.is_family() => {
        errors.add(Field::Category, ErrorKey::FamilyPrimaryRequired)
      }
      Some(_) => {}
    }
    let in_target = ctx.snapshot.roles_of(person.person_id).any(|r| {
      r.kind.is_membership() && r.layer_id == target.layer_id && r.is_current_or_future(ctx.today)
    });
    if in_target {
      errors.add(Field::Group, ErrorKey::AlreadyInSection);
    }
    errors.into_result()?;
    let Some(primary) = primary else { return Ok(ctx.change_set()) };

    let (kind, event) = if target.requires_approval {
      (RoleKind::SecondaryPendingRegistration, Event::RegistrationPending)
    } else {
      (RoleKind::SecondaryMembership, Event::SecondaryJoined)
    };
    let end_on = primary.end_on.map_or(end_of_year(ctx.today), |e| e.min(end_of_year(ctx.today)));

    let members = if self.register_as_family {
      household::family_members(ctx.snapshot, person, ctx.today)
    } else {
      vec![person.person_id]
    };

    let mut changes = ctx.change_set();
    for member_id in members {
      let member = ctx.person(member_id)?;
      let already = member_id != person.person_id
        && ctx.snapshot.roles_of(member_id).any(|r| {
          r.kind.is_membership()
            && r.layer_id == target.layer_id
            && r.is_current_or_future(ctx.today)
        });
      if already {
        continue;
      }
      let category = Category::derive(
        ctx.age_of(member),
        self.register_as_family,
        ctx.thresholds.youth_until_age,
      );
      changes.create(
        NewRole {
          person_id: member_id,
          group_id:  target.group_id,
          kind,
          category:  Some(category),
          start_on:  Some(ctx.today),
          end_on:    Some(end_on),
        }
        .build(target.layer_id, ctx.now),
      );
      changes.notify(Notification::new(event, member_id, target.group_id, ctx.today));
    }
    Ok(changes)
  }
}

/// Leave an additional section.
#[derive(Debug, Clone)]
pub struct LeaveSecondarySection {
  pub role_id:      Uuid,
  pub terminate_on: TerminateOn,
}

impl LeaveSecondarySection {
  pub fn new(role_id: Uuid, terminate_on: TerminateOn) -> Self { Self { role_id, terminate_on } }
}

impl Operation for LeaveSecondarySection {
  fn scope(&self) -> Scope { Scope::Role(self.role_id) }

  fn plan(&self, ctx: &Context<'_>) -> Result<ChangeSet> {
    let role = ctx.role(self.role_id)?;

    let mut errors = ValidationErrors::new();
    if role.kind != RoleKind::SecondaryMembership {
      errors.add(Field::Role, ErrorKey::NotSecondary);
    } else if !role.is_active(ctx.today) {
      errors.add(Field::Role, ErrorKey::NotActive);
    } else if role.is_terminated() {
      errors.add(Field::Role, ErrorKey::AlreadyTerminated);
    }
    let end_on = self.terminate_on.resolve(ctx.today);
    if role.start_on.is_some_and(|s| end_on < s) {
      errors.add(Field::EndOn, ErrorKey::TerminationBeforeStart);
    }
    errors.into_result()?;

    let mut changes = ctx.change_set();
    end_role(&mut changes, role, end_on, None, ctx);
    changes.notify(Notification::new(Event::SecondaryLeft, role.person_id, role.group_id, end_on));

    if role.is_family() {
      let counterparts: Vec<_> = household::household_counterparts(ctx.snapshot, role, ctx.today)
        .filter(|r| !r.is_terminated())
        .collect();
      for counterpart in counterparts {
        end_role(&mut changes, counterpart, end_on, None, ctx);
        changes.notify(Notification::new(
          Event::SecondaryLeft,
          counterpart.person_id,
          counterpart.group_id,
          end_on,
        ));
      }
    }
    Ok(changes)
  }
}
