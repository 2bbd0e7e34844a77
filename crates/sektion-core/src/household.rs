//! Household propagation: keeping every member of a family membership in
//! step with the decisions made for one of them.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  config::Thresholds,
  person::Person,
  role::{Role, yesterday},
  snapshot::{ChangeSet, Snapshot},
};

// ─── Destroy ─────────────────────────────────────────────────────────────────

/// Switches for [`destroy`]. The defaults run every cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestroyOptions {
  /// Never hard delete, even roles that have not started yet.
  pub always_soft:          bool,
  /// Keep the person's secondary and function roles when a primary goes.
  pub skip_dependent_roles: bool,
  /// Keep the other household members' family roles.
  pub skip_household:       bool,
}

impl DestroyOptions {
  /// Used when the caller replaces the role itself in the same operation.
  pub fn superseding() -> Self {
    Self { always_soft: true, skip_dependent_roles: true, skip_household: true }
  }
}

/// Remove one role. A role that was never active before today is deleted
/// outright; anything else is ended yesterday and soft deleted.
pub fn destroy_one(
  changes: &mut ChangeSet,
  role: &Role,
  today: NaiveDate,
  now: DateTime<Utc>,
  always_soft: bool,
) {
  let never_active = role.start_on.is_none_or(|s| s >= today);
  if never_active && !always_soft {
    changes.delete(role.role_id);
    return;
  }

  let last_day = yesterday(today);
  let mut ended = role.clone();
  if role.start_on.is_none_or(|s| s <= last_day) {
    ended.end_on = Some(role.end_on.map_or(last_day, |e| e.min(last_day)));
  }
  ended.deleted_at = Some(now);
  changes.update(ended);
}

/// Remove `role` and, unless opted out, its dependents and household
/// counterparts.
pub fn destroy(
  snapshot: &Snapshot,
  changes: &mut ChangeSet,
  role: &Role,
  options: DestroyOptions,
  today: NaiveDate,
  now: DateTime<Utc>,
) {
  destroy_one(changes, role, today, now, options.always_soft);

  if !options.skip_dependent_roles && role.is_primary() && !role.kind.is_pending() {
    let dependents: Vec<&Role> = snapshot
      .roles_of(role.person_id)
      .filter(|r| r.role_id != role.role_id && r.is_current_or_future(today))
      .filter(|r| {
        r.is_secondary()
          || (r.kind.destroy_on_termination() && r.layer_id == role.layer_id)
      })
      .filter(|r| !changes.touches(r.role_id))
      .collect();
    for dependent in dependents {
      destroy_one(changes, dependent, today, now, options.always_soft);
    }
  }

  if !options.skip_household && role.is_primary() && role.is_family() {
    let counterparts: Vec<Role> = household_counterparts(snapshot, role, today)
      .filter(|r| !changes.touches(r.role_id))
      .cloned()
      .collect();
    let nested = DestroyOptions { skip_household: true, ..options };
    for counterpart in &counterparts {
      destroy(snapshot, changes, counterpart, nested, today, now);
    }
  }
}

// ─── Counterparts ────────────────────────────────────────────────────────────

/// The other household members' live family roles matching `role` in kind
/// and group.
pub fn household_counterparts<'a>(
  snapshot: &'a Snapshot,
  role: &'a Role,
  today: NaiveDate,
) -> impl Iterator<Item = &'a Role> + 'a {
  let members: BTreeSet<Uuid> = snapshot
    .person(role.person_id)
    .map(|p| {
      snapshot
        .household_of(p)
        .map(|m| m.person_id)
        .filter(|id| *id != role.person_id)
        .collect()
    })
    .unwrap_or_default();

  snapshot.roles().filter(move |r| {
    members.contains(&r.person_id)
      && r.is_family()
      && r.kind == role.kind
      && r.group_id == role.group_id
      && r.is_current_or_future(today)
  })
}

/// The household members sharing `person`'s live family primary membership,
/// `person` included. Without a family membership only `person` is returned.
pub fn family_members(snapshot: &Snapshot, person: &Person, today: NaiveDate) -> Vec<Uuid> {
  let Some(primary) = snapshot
    .roles_of(person.person_id)
    .find(|r| r.is_primary() && r.is_family() && r.is_current_or_future(today))
  else {
    return vec![person.person_id];
  };
  let mut members = vec![person.person_id];
  for counterpart in household_counterparts(snapshot, primary, today) {
    if !members.contains(&counterpart.person_id) {
      members.push(counterpart.person_id);
    }
  }
  members
}

// ─── Propagation ─────────────────────────────────────────────────────────────

/// The household's live family primary roles, all in one group.
///
/// More than one group means the household is corrupt; that is logged and
/// reported as [`Error::AmbiguousFamilySection`].
pub fn family_primary_roles<'a>(
  snapshot: &'a Snapshot,
  household_key: &str,
  today: NaiveDate,
) -> Result<Vec<&'a Role>> {
  let members: BTreeSet<Uuid> =
    snapshot.household(household_key).map(|p| p.person_id).collect();
  let roles: Vec<&Role> = snapshot
    .roles()
    .filter(|r| members.contains(&r.person_id))
    .filter(|r| r.is_primary() && r.is_family() && r.is_current_or_future(today))
    .collect();

  let groups: BTreeSet<Uuid> = roles.iter().map(|r| r.group_id).collect();
  if groups.len() > 1 {
    let groups: Vec<Uuid> = groups.into_iter().collect();
    tracing::error!(
      household = household_key,
      ?groups,
      "family primary memberships span several groups"
    );
    return Err(Error::AmbiguousFamilySection {
      household: household_key.to_owned(),
      groups,
    });
  }
  Ok(roles)
}

fn eligible(person: &Person, today: NaiveDate, thresholds: &Thresholds) -> bool {
  person.years_on(today).is_some_and(|age| age >= thresholds.minimum_age)
}

fn holds_membership(snapshot: &Snapshot, person_id: Uuid, today: NaiveDate) -> bool {
  snapshot
    .roles_of(person_id)
    .any(|r| r.kind.is_membership() && r.is_current_or_future(today))
}

/// Hand the household's family memberships to every eligible member who
/// lacks them.
///
/// Works on `snapshot` with `changes` already applied, so roles created
/// earlier in the same operation are propagated too. Returns the members
/// that received roles.
pub fn propagate(
  snapshot: &Snapshot,
  changes: &mut ChangeSet,
  household_key: &str,
  today: NaiveDate,
  now: DateTime<Utc>,
  thresholds: &Thresholds,
) -> Result<Vec<Uuid>> {
  let mut received = BTreeSet::new();
  let current = snapshot.apply(changes);

  let Some(template) = family_primary_roles(&current, household_key, today)?
    .first()
    .map(|r| (*r).clone())
  else {
    return Ok(Vec::new());
  };

  // Members without any membership get the primary role.
  let newcomers: Vec<Uuid> = current
    .household(household_key)
    .filter(|p| eligible(p, today, thresholds))
    .filter(|p| !holds_membership(&current, p.person_id, today))
    .map(|p| p.person_id)
    .collect();
  for person_id in newcomers {
    changes.create(template.duplicate_for(person_id, now));
    received.insert(person_id);
  }

  // Every member of the family membership gets each family secondary role,
  // one per group, unless they already hold a role in that layer.
  let current = snapshot.apply(changes);
  let mut seen_groups = BTreeSet::new();
  let family = family_members_of_household(&current, household_key, &template, today);
  let secondaries: Vec<Role> = family
    .iter()
    .flat_map(|id| current.roles_of(*id))
    .filter(|r| r.is_secondary() && r.is_family() && r.is_current_or_future(today))
    .filter(|r| seen_groups.insert(r.group_id))
    .cloned()
    .collect();

  for secondary in &secondaries {
    for &person_id in &family {
      let Some(person) = current.person(person_id) else { continue };
      if !eligible(person, today, thresholds) {
        continue;
      }
      let has_layer_role = current.roles_of(person_id).any(|r| {
        r.kind.is_membership()
          && r.layer_id == secondary.layer_id
          && r.is_current_or_future(today)
      });
      let just_created = changes
        .created()
        .any(|r| r.person_id == person_id && r.layer_id == secondary.layer_id);
      if has_layer_role || just_created {
        continue;
      }
      changes.create(secondary.duplicate_for(person_id, now));
      received.insert(person_id);
    }
  }

  Ok(received.into_iter().collect())
}

fn family_members_of_household(
  snapshot: &Snapshot,
  household_key: &str,
  template: &Role,
  today: NaiveDate,
) -> Vec<Uuid> {
  snapshot
    .household(household_key)
    .filter(|p| {
      snapshot.roles_of(p.person_id).any(|r| {
        r.is_primary()
          && r.is_family()
          && r.group_id == template.group_id
          && r.is_current_or_future(today)
      })
    })
    .map(|p| p.person_id)
    .collect()
}

// ─── Main person ─────────────────────────────────────────────────────────────

/// Make `person_id` the only main person of its household: every current
/// holder of the flag is cleared in the same change set.
pub fn assign_main_person(
  snapshot: &Snapshot,
  changes: &mut ChangeSet,
  household_key: &str,
  person_id: Uuid,
) {
  for member in snapshot.household(household_key) {
    let should_be_main = member.person_id == person_id;
    if member.main_person != should_be_main {
      let mut updated = member.clone();
      updated.main_person = should_be_main;
      changes.update_person(updated);
    }
  }
}

/// Make `person_id` main person unless the household already has one.
pub fn ensure_main_person(
  snapshot: &Snapshot,
  changes: &mut ChangeSet,
  household_key: &str,
  person_id: Uuid,
) {
  if !snapshot.household(household_key).any(|p| p.main_person) {
    assign_main_person(snapshot, changes, household_key, person_id);
  }
}
