use chrono::NaiveDate;
use uuid::Uuid;

use super::{Context, Operation, Scope, invalid};
use crate::{
  Result,
  household,
  notify::{Event, Notification},
  role::{Category, RoleKind},
  snapshot::ChangeSet,
  validation::{ErrorKey, Field, ValidationErrors},
};

/// Notify every member who received a family primary membership.
fn announce_family_roles(changes: &mut ChangeSet, received: &[Uuid], today: NaiveDate) {
  let started: Vec<Notification> = changes
    .created()
    .filter(|r| r.is_primary() && received.contains(&r.person_id))
    .map(|r| {
      Notification::new(
        Event::FamilyMembershipStarted,
        r.person_id,
        r.group_id,
        r.start_on.unwrap_or(today).max(today),
      )
    })
    .collect();
  for notification in started {
    changes.notify(notification);
  }
}

/// Turn a secondary membership into a family one for the whole family.
#[derive(Debug, Clone)]
pub struct ConvertSecondaryToFamily {
  pub role_id: Uuid,
}

impl ConvertSecondaryToFamily {
  pub fn new(role_id: Uuid) -> Self { Self { role_id } }
}

impl Operation for ConvertSecondaryToFamily {
  fn scope(&self) -> Scope { Scope::Role(self.role_id) }

  fn plan(&self, ctx: &Context<'_>) -> Result<ChangeSet> {
    let role = ctx.role(self.role_id)?;
    let person = ctx.person(role.person_id)?;

    let mut errors = ValidationErrors::new();
    if role.kind != RoleKind::SecondaryMembership {
      errors.add(Field::Role, ErrorKey::NotSecondary);
    } else if !role.is_active(ctx.today) {
      errors.add(Field::Role, ErrorKey::NotActive);
    } else if role.is_family() {
      errors.add(Field::Category, ErrorKey::AlreadyFamily);
    }
    if !ctx.active_primary(person.person_id).is_some_and(|p| p.is_family()) {
      errors.add(Field::Category, ErrorKey::FamilyPrimaryRequired);
    }
    errors.into_result()?;

    let mut changes = ctx.change_set();
    for member_id in household::family_members(ctx.snapshot, person, ctx.today) {
      let same_group = ctx.snapshot.roles_of(member_id).filter(|r| {
        r.kind == role.kind
          && r.group_id == role.group_id
          && !r.is_family()
          && r.is_current_or_future(ctx.today)
      });
      for r in same_group {
        let mut converted = r.clone();
        converted.category = Some(Category::Family);
        changes.update(converted);
        changes.notify(Notification::new(
          Event::FamilyMembershipStarted,
          member_id,
          r.group_id,
          ctx.today,
        ));
      }
    }

    if let Some(key) = person.household_key.as_deref() {
      household::propagate(ctx.snapshot, &mut changes, key, ctx.today, ctx.now, ctx.thresholds)?;
    }
    Ok(changes)
  }
}

/// Add a person to a household; the household's family memberships follow.
#[derive(Debug, Clone)]
pub struct JoinHousehold {
  pub person_id:     Uuid,
  pub household_key: String,
}

impl JoinHousehold {
  pub fn new(person_id: Uuid, household_key: impl Into<String>) -> Self {
    Self { person_id, household_key: household_key.into() }
  }
}

impl Operation for JoinHousehold {
  fn scope(&self) -> Scope {
    Scope::Joining { person_id: self.person_id, key: self.household_key.clone() }
  }

  fn plan(&self, ctx: &Context<'_>) -> Result<ChangeSet> {
    let person = ctx.person(self.person_id)?;
    if person.household_key.as_deref() == Some(self.household_key.as_str()) {
      return Err(invalid(Field::Person, ErrorKey::AlreadyInHousehold));
    }

    let mut changes = ctx.change_set();
    let mut joined = person.clone();
    joined.household_key = Some(self.household_key.clone());
    joined.main_person = false;
    changes.update_person(joined);

    let received = household::propagate(
      ctx.snapshot,
      &mut changes,
      &self.household_key,
      ctx.today,
      ctx.now,
      ctx.thresholds,
    )?;
    announce_family_roles(&mut changes, &received, ctx.today);
    Ok(changes)
  }
}

/// Re-run propagation for a household without changing its members.
#[derive(Debug, Clone)]
pub struct SyncHousehold {
  pub household_key: String,
}

impl SyncHousehold {
  pub fn new(household_key: impl Into<String>) -> Self {
    Self { household_key: household_key.into() }
  }
}

impl Operation for SyncHousehold {
  fn scope(&self) -> Scope { Scope::Household(self.household_key.clone()) }

  fn plan(&self, ctx: &Context<'_>) -> Result<ChangeSet> {
    let mut changes = ctx.change_set();
    let received = household::propagate(
      ctx.snapshot,
      &mut changes,
      &self.household_key,
      ctx.today,
      ctx.now,
      ctx.thresholds,
    )?;
    announce_family_roles(&mut changes, &received, ctx.today);
    Ok(changes)
  }
}

/// Make a person the main person of their household.
#[derive(Debug, Clone)]
pub struct AssignMainPerson {
  pub person_id: Uuid,
}

impl AssignMainPerson {
  pub fn new(person_id: Uuid) -> Self { Self { person_id } }
}

impl Operation for AssignMainPerson {
  fn scope(&self) -> Scope { Scope::Person(self.person_id) }

  fn plan(&self, ctx: &Context<'_>) -> Result<ChangeSet> {
    let person = ctx.person(self.person_id)?;
    let Some(key) = person.household_key.as_deref() else {
      return Err(invalid(Field::Person, ErrorKey::NoHousehold));
    };
    let mut changes = ctx.change_set();
    household::assign_main_person(ctx.snapshot, &mut changes, key, person.person_id);
    Ok(changes)
  }
}
