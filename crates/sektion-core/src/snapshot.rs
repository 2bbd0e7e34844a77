//! In-memory role sets and the change sets that transform them.
//!
//! A [`Snapshot`] holds every person, role and termination journal entry an
//! operation may look at: usually one household. Operations never write to a
//! store directly. They describe their effect as a [`ChangeSet`], which is
//! first applied to the snapshot to validate the hypothetical result and
//! then committed by the store in one transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  membership::LoadedRoles,
  notify::Notification,
  person::{Group, Person},
  role::Role,
};

// ─── Termination journal ─────────────────────────────────────────────────────

/// The state of one role before a termination-style mutation touched it.
///
/// All entries written by the same operation share a `mutation_id`, which is
/// also stamped on the roles themselves. Undo looks the batch up by that id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminationEntry {
  pub entry_id:            Uuid,
  pub mutation_id:         Uuid,
  pub role_id:             Uuid,
  pub previous_end_on:     Option<NaiveDate>,
  pub previous_terminated: bool,
  pub previous_deleted_at: Option<DateTime<Utc>>,
  pub previous_reason:     Option<String>,
  pub recorded_at:         DateTime<Utc>,
  /// Set once the entry has been restored; restored entries are inert.
  pub undone_at:           Option<DateTime<Utc>>,
}

impl TerminationEntry {
  pub fn record(mutation_id: Uuid, before: &Role, now: DateTime<Utc>) -> Self {
    Self {
      entry_id: Uuid::new_v4(),
      mutation_id,
      role_id: before.role_id,
      previous_end_on: before.end_on,
      previous_terminated: before.terminated,
      previous_deleted_at: before.deleted_at,
      previous_reason: before.termination_reason.clone(),
      recorded_at: now,
      undone_at: None,
    }
  }

  pub fn is_open(&self) -> bool { self.undone_at.is_none() }
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
  people:       BTreeMap<Uuid, Person>,
  groups:       BTreeMap<Uuid, Group>,
  /// Ordered by start date, then creation time.
  roles:        Vec<Role>,
  terminations: Vec<TerminationEntry>,
}

impl Snapshot {
  pub fn new(
    people: impl IntoIterator<Item = Person>,
    groups: impl IntoIterator<Item = Group>,
    roles: impl IntoIterator<Item = Role>,
    terminations: impl IntoIterator<Item = TerminationEntry>,
  ) -> Self {
    let mut snapshot = Self {
      people:       people.into_iter().map(|p| (p.person_id, p)).collect(),
      groups:       groups.into_iter().map(|g| (g.group_id, g)).collect(),
      roles:        roles.into_iter().collect(),
      terminations: terminations.into_iter().collect(),
    };
    snapshot.sort_roles();
    snapshot
  }

  fn sort_roles(&mut self) {
    self.roles.sort_by_key(|r| (r.start_on, r.created_at));
  }

  // ── Lookups ───────────────────────────────────────────────────────────

  pub fn person(&self, id: Uuid) -> Option<&Person> { self.people.get(&id) }

  pub fn require_person(&self, id: Uuid) -> Result<&Person> {
    self.person(id).ok_or(Error::PersonNotFound(id))
  }

  pub fn people(&self) -> impl Iterator<Item = &Person> { self.people.values() }

  pub fn group(&self, id: Uuid) -> Option<&Group> { self.groups.get(&id) }

  pub fn require_group(&self, id: Uuid) -> Result<&Group> {
    self.group(id).ok_or(Error::GroupNotFound(id))
  }

  pub fn role(&self, id: Uuid) -> Option<&Role> {
    self.roles.iter().find(|r| r.role_id == id)
  }

  pub fn require_role(&self, id: Uuid) -> Result<&Role> {
    self.role(id).ok_or(Error::RoleNotFound(id))
  }

  pub fn roles(&self) -> impl Iterator<Item = &Role> { self.roles.iter() }

  pub fn roles_of(&self, person_id: Uuid) -> impl Iterator<Item = &Role> {
    self.roles.iter().filter(move |r| r.person_id == person_id)
  }

  /// The eagerly loaded adapter for the membership facade.
  pub fn loaded_roles(&self, person_id: Uuid) -> LoadedRoles<'_> {
    LoadedRoles::new(&self.roles, person_id)
  }

  /// Everyone sharing `person`'s household, `person` included. A person
  /// without a household key is a household of one.
  pub fn household_of<'a>(
    &'a self,
    person: &'a Person,
  ) -> impl Iterator<Item = &'a Person> + 'a {
    self.people.values().filter(move |p| {
      p.person_id == person.person_id || p.shares_household_with(person)
    })
  }

  pub fn household<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Person> + 'a {
    self
      .people
      .values()
      .filter(move |p| p.household_key.as_deref() == Some(key))
  }

  /// Open journal entries written under `mutation_id`.
  pub fn open_entries(&self, mutation_id: Uuid) -> impl Iterator<Item = &TerminationEntry> {
    self
      .terminations
      .iter()
      .filter(move |e| e.mutation_id == mutation_id && e.is_open())
  }

  // ── Hypothetical state ────────────────────────────────────────────────

  /// The snapshot as it would look after `changes` were committed.
  pub fn apply(&self, changes: &ChangeSet) -> Snapshot {
    let mut next = self.clone();
    for change in &changes.roles {
      match change {
        RoleChange::Create(role) => next.roles.push(role.clone()),
        RoleChange::Update(role) => {
          if let Some(slot) = next.roles.iter_mut().find(|r| r.role_id == role.role_id) {
            *slot = role.clone();
          }
        }
        RoleChange::Delete(id) => {
          next.roles.retain(|r| r.role_id != *id);
          next.terminations.retain(|e| e.role_id != *id);
        }
      }
    }
    for person in &changes.people {
      next.people.insert(person.person_id, person.clone());
    }
    next.terminations.extend(changes.journal.iter().cloned());
    for entry in next.terminations.iter_mut() {
      if changes.undone.contains(&entry.entry_id) {
        entry.undone_at = Some(changes.recorded_at);
      }
    }
    next.sort_roles();
    next
  }
}

// ─── ChangeSet ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", content = "role", rename_all = "snake_case")]
pub enum RoleChange {
  Create(Role),
  Update(Role),
  /// Hard delete. Soft deletes are updates setting `deleted_at`.
  Delete(Uuid),
}

impl RoleChange {
  pub fn role_id(&self) -> Uuid {
    match self {
      Self::Create(r) | Self::Update(r) => r.role_id,
      Self::Delete(id) => *id,
    }
  }
}

/// Everything one operation writes, committed atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
  pub mutation_id:   Uuid,
  pub recorded_at:   DateTime<Utc>,
  pub roles:         Vec<RoleChange>,
  pub people:        Vec<Person>,
  pub journal:       Vec<TerminationEntry>,
  /// Journal entries restored by this change set.
  pub undone:        Vec<Uuid>,
  /// Dispatched only after the change set has been committed.
  pub notifications: Vec<Notification>,
}

impl ChangeSet {
  pub fn new(mutation_id: Uuid, recorded_at: DateTime<Utc>) -> Self {
    Self {
      mutation_id,
      recorded_at,
      roles: Vec::new(),
      people: Vec::new(),
      journal: Vec::new(),
      undone: Vec::new(),
      notifications: Vec::new(),
    }
  }

  pub fn create(&mut self, role: Role) { self.roles.push(RoleChange::Create(role)); }

  /// Record an update; a later update of the same role replaces the earlier
  /// one, and updating a role created here rewrites the creation.
  pub fn update(&mut self, role: Role) {
    match self.roles.iter_mut().find(|c| c.role_id() == role.role_id) {
      Some(RoleChange::Create(existing)) | Some(RoleChange::Update(existing)) => {
        *existing = role;
      }
      Some(RoleChange::Delete(_)) => {}
      None => self.roles.push(RoleChange::Update(role)),
    }
  }

  pub fn delete(&mut self, role_id: Uuid) {
    self.roles.retain(|c| c.role_id() != role_id);
    self.roles.push(RoleChange::Delete(role_id));
  }

  pub fn touches(&self, role_id: Uuid) -> bool {
    self.roles.iter().any(|c| c.role_id() == role_id)
  }

  pub fn update_person(&mut self, person: Person) {
    self.people.retain(|p| p.person_id != person.person_id);
    self.people.push(person);
  }

  pub fn notify(&mut self, notification: Notification) {
    self.notifications.push(notification);
  }

  pub fn is_empty(&self) -> bool {
    self.roles.is_empty() && self.people.is_empty() && self.undone.is_empty()
  }

  pub fn created(&self) -> impl Iterator<Item = &Role> {
    self.roles.iter().filter_map(|c| match c {
      RoleChange::Create(r) => Some(r),
      _ => None,
    })
  }

  pub fn updated(&self) -> impl Iterator<Item = &Role> {
    self.roles.iter().filter_map(|c| match c {
      RoleChange::Update(r) => Some(r),
      _ => None,
    })
  }

  pub fn deleted(&self) -> impl Iterator<Item = Uuid> + '_ {
    self.roles.iter().filter_map(|c| match c {
      RoleChange::Delete(id) => Some(*id),
      _ => None,
    })
  }
}
