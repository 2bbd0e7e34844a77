use chrono::NaiveDate;
use uuid::Uuid;

use super::{Context, Operation, Scope, invalid};
use crate::{
  Error, Result,
  household::{self, DestroyOptions},
  notify::{Event, Notification},
  role::{NewRole, Role, RoleKind, end_of_year, yesterday},
  snapshot::ChangeSet,
  validation::{ErrorKey, Field, ValidationErrors},
};

/// Move a person's primary membership (and, for a family membership, the
/// whole family's) to another section.
#[derive(Debug, Clone)]
pub struct SwitchPrimarySection {
  pub person_id:       Uuid,
  pub target_group_id: Uuid,
  /// First day in the new section: today or later.
  pub start_on:        NaiveDate,
}

impl SwitchPrimarySection {
  pub fn new(person_id: Uuid, target_group_id: Uuid, start_on: NaiveDate) -> Self {
    Self { person_id, target_group_id, start_on }
  }
}

impl Operation for SwitchPrimarySection {
  fn scope(&self) -> Scope { Scope::Person(self.person_id) }

  fn plan(&self, ctx: &Context<'_>) -> Result<ChangeSet> {
    let person = ctx.person(self.person_id)?;
    let target = ctx.snapshot.require_group(self.target_group_id)?;
    let Some(primary) = ctx.active_primary(person.person_id) else {
      return Err(invalid(Field::Person, ErrorKey::NoActivePrimary));
    };

    let mut errors = ValidationErrors::new();
    if primary.layer_id == target.layer_id {
      errors.add(Field::Group, ErrorKey::SameSection);
    }
    if self.start_on < ctx.today {
      errors.add(Field::StartOn, ErrorKey::StartInPast);
    }

    let members = if primary.is_family() {
      household::family_members(ctx.snapshot, person, ctx.today)
    } else {
      vec![person.person_id]
    };
    let olds: Vec<&Role> = members
      .iter()
      .filter_map(|id| {
        ctx.snapshot.roles_of(*id).find(|r| {
          r.kind == primary.kind && r.group_id == primary.group_id && r.is_active(ctx.today)
        })
      })
      .collect();

    let in_target = olds.iter().any(|old| {
      ctx.snapshot.roles_of(old.person_id).any(|r| {
        r.kind.is_membership()
          && r.layer_id == target.layer_id
          && r.is_current_or_future(ctx.today)
      })
    });
    if in_target {
      errors.add(Field::Group, ErrorKey::AlreadyInSection);
    }
    if !errors.is_empty() {
      return Err(Error::Invalid(errors));
    }

    let mut changes = ctx.change_set();
    for old in olds {
      if self.start_on == ctx.today {
        household::destroy(
          ctx.snapshot,
          &mut changes,
          old,
          DestroyOptions::superseding(),
          ctx.today,
          ctx.now,
        );
      } else {
        let last_day = yesterday(self.start_on);
        let mut ended = old.clone();
        ended.end_on = Some(old.end_on.map_or(last_day, |e| e.min(last_day)));
        changes.update(ended);
      }

      let replacement = NewRole {
        person_id: old.person_id,
        group_id:  target.group_id,
        kind:      RoleKind::PrimaryMembership,
        category:  old.category,
        start_on:  Some(self.start_on),
        end_on:    Some(end_of_year(self.start_on)),
      }
      .build(target.layer_id, ctx.now);
      carry_secondaries(ctx, &mut changes, &replacement);
      changes.create(replacement);
      changes.notify(Notification::new(
        Event::PrimarySectionSwitched,
        old.person_id,
        target.group_id,
        self.start_on,
      ));
    }
    Ok(changes)
  }
}

/// Turn a secondary membership into the primary one and vice versa.
#[derive(Debug, Clone)]
pub struct SwapPrimarySecondary {
  pub person_id:         Uuid,
  pub secondary_role_id: Uuid,
}

impl SwapPrimarySecondary {
  pub fn new(person_id: Uuid, secondary_role_id: Uuid) -> Self {
    Self { person_id, secondary_role_id }
  }
}

impl Operation for SwapPrimarySecondary {
  fn scope(&self) -> Scope { Scope::Person(self.person_id) }

  fn plan(&self, ctx: &Context<'_>) -> Result<ChangeSet> {
    let person = ctx.person(self.person_id)?;
    let secondary = ctx.role(self.secondary_role_id)?;

    let mut errors = ValidationErrors::new();
    if secondary.kind != RoleKind::SecondaryMembership || secondary.person_id != person.person_id {
      errors.add(Field::Role, ErrorKey::NotSecondary);
    } else if !secondary.is_active(ctx.today) {
      errors.add(Field::Role, ErrorKey::NotActive);
    } else if secondary.is_terminated() {
      errors.add(Field::Role, ErrorKey::AlreadyTerminated);
    }
    let primary = ctx.active_primary(person.person_id);
    match primary {
      None => errors.add(Field::Person, ErrorKey::NoActivePrimary),
      Some(p) if p.is_terminated() => errors.add(Field::Person, ErrorKey::PrimaryTerminated),
      Some(_) => {}
    }
    let Some(primary) = primary.filter(|_| errors.is_empty()) else {
      return Err(Error::Invalid(errors));
    };

    let members = if primary.is_family() {
      household::family_members(ctx.snapshot, person, ctx.today)
    } else {
      vec![person.person_id]
    };

    let superseded = DestroyOptions {
      skip_dependent_roles: true,
      skip_household: true,
      ..DestroyOptions::default()
    };
    let mut changes = ctx.change_set();
    for member_id in members {
      let find = |group_id: Uuid, kind: RoleKind| {
        ctx.snapshot.roles_of(member_id).find(|r| {
          r.kind == kind && r.group_id == group_id && r.is_active(ctx.today)
        })
      };
      let (Some(old_primary), Some(old_secondary)) = (
        find(primary.group_id, primary.kind),
        find(secondary.group_id, secondary.kind),
      ) else {
        continue;
      };

      for old in [old_primary, old_secondary] {
        household::destroy(ctx.snapshot, &mut changes, old, superseded, ctx.today, ctx.now);
      }
      let new_primary = NewRole {
        person_id: member_id,
        group_id:  old_secondary.group_id,
        kind:      RoleKind::PrimaryMembership,
        category:  old_primary.category,
        start_on:  Some(ctx.today),
        end_on:    old_primary.end_on,
      }
      .build(old_secondary.layer_id, ctx.now);
      carry_secondaries(ctx, &mut changes, &new_primary);
      changes.create(new_primary);
      changes.create(
        NewRole {
          person_id: member_id,
          group_id:  old_primary.group_id,
          kind:      RoleKind::SecondaryMembership,
          category:  old_secondary.category,
          start_on:  Some(ctx.today),
          end_on:    old_secondary.end_on,
        }
        .build(old_primary.layer_id, ctx.now),
      );
      changes.notify(Notification::new(
        Event::SectionsSwapped,
        member_id,
        old_secondary.group_id,
        ctx.today,
      ));
    }
    Ok(changes)
  }
}

/// Hand the person's other secondary roles over to `primary`, which takes
/// effect on its start date. Each one ends the day before and continues as
/// a new role within the new primary's period; roles that had not started
/// by then are moved over entirely.
fn carry_secondaries(ctx: &Context<'_>, changes: &mut ChangeSet, primary: &Role) {
  let Some(period) = primary.active_period() else { return };
  let last_day = yesterday(period.start);

  let secondaries: Vec<&Role> = ctx
    .snapshot
    .roles_of(primary.person_id)
    .filter(|r| r.is_secondary() && r.is_current_or_future(period.start))
    .filter(|r| !changes.touches(r.role_id))
    .collect();

  for secondary in secondaries {
    if secondary.start_on.is_none_or(|s| s <= last_day) {
      let mut ended = secondary.clone();
      ended.end_on = Some(last_day);
      changes.update(ended);
    } else {
      changes.delete(secondary.role_id);
    }

    let start_on = secondary.start_on.map_or(period.start, |s| s.max(period.start));
    let end_on = secondary.end_on.map_or(period.end, |e| e.min(period.end));
    if start_on > end_on {
      continue;
    }
    changes.create(Role {
      role_id: Uuid::new_v4(),
      start_on: Some(start_on),
      end_on: Some(end_on),
      mutation_id: None,
      deleted_at: None,
      created_at: ctx.now,
      ..secondary.clone()
    });
  }
}
