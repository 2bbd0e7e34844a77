//! Synchronous reads and writes against an open connection or transaction.
//!
//! Everything here runs inside a `tokio_rusqlite` closure, so it takes a
//! plain [`rusqlite::Connection`] (a `Transaction` derefs to one).

use std::collections::BTreeSet;

use rusqlite::{Connection, OptionalExtension as _, params};
use sektion_core::{
  operations::Scope,
  person::{Group, Person},
  role::Role,
  snapshot::{ChangeSet, RoleChange, Snapshot, TerminationEntry},
};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    ENTRY_COLUMNS, GROUP_COLUMNS, PERSON_COLUMNS, ROLE_COLUMNS, RawEntry, RawGroup,
    RawPerson, RawRole, encode_category, encode_date, encode_dt, encode_kind, encode_uuid,
  },
};

// ─── Reads ───────────────────────────────────────────────────────────────────

pub fn person(conn: &Connection, id: Uuid) -> Result<Option<Person>> {
  let raw = conn
    .query_row(
      &format!("SELECT {PERSON_COLUMNS} FROM people WHERE person_id = ?1"),
      params![encode_uuid(id)],
      RawPerson::from_row,
    )
    .optional()?;
  raw.map(RawPerson::into_person).transpose()
}

pub fn people(conn: &Connection) -> Result<Vec<Person>> {
  let mut stmt =
    conn.prepare(&format!("SELECT {PERSON_COLUMNS} FROM people ORDER BY created_at"))?;
  let raws = stmt
    .query_map([], RawPerson::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawPerson::into_person).collect()
}

pub fn household(conn: &Connection, key: &str) -> Result<Vec<Person>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {PERSON_COLUMNS} FROM people WHERE household_key = ?1 ORDER BY created_at"
  ))?;
  let raws = stmt
    .query_map(params![key], RawPerson::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawPerson::into_person).collect()
}

pub fn household_keys(conn: &Connection) -> Result<Vec<String>> {
  let mut stmt = conn.prepare(
    "SELECT DISTINCT household_key FROM people
     WHERE household_key IS NOT NULL
     ORDER BY household_key",
  )?;
  let keys = stmt
    .query_map([], |row| row.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()?;
  Ok(keys)
}

pub fn groups(conn: &Connection) -> Result<Vec<Group>> {
  let mut stmt = conn.prepare(&format!("SELECT {GROUP_COLUMNS} FROM groups"))?;
  let raws = stmt
    .query_map([], RawGroup::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawGroup::into_group).collect()
}

pub fn role(conn: &Connection, id: Uuid) -> Result<Option<Role>> {
  let raw = conn
    .query_row(
      &format!("SELECT {ROLE_COLUMNS} FROM roles WHERE role_id = ?1"),
      params![encode_uuid(id)],
      RawRole::from_row,
    )
    .optional()?;
  raw.map(RawRole::into_role).transpose()
}

/// Every role of `person_id`, soft-deleted ones included.
pub fn roles_of(conn: &Connection, person_id: Uuid) -> Result<Vec<Role>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {ROLE_COLUMNS} FROM roles WHERE person_id = ?1 ORDER BY start_on, created_at"
  ))?;
  let raws = stmt
    .query_map(params![encode_uuid(person_id)], RawRole::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawRole::into_role).collect()
}

fn entries_of(conn: &Connection, person_id: Uuid) -> Result<Vec<TerminationEntry>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {ENTRY_COLUMNS} FROM terminations
     WHERE role_id IN (SELECT role_id FROM roles WHERE person_id = ?1)
     ORDER BY recorded_at"
  ))?;
  let raws = stmt
    .query_map(params![encode_uuid(person_id)], RawEntry::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawEntry::into_entry).collect()
}

/// Load everything an operation with `scope` may look at: the people
/// involved with their whole households, their roles and journal entries,
/// and every group.
pub fn snapshot(conn: &Connection, scope: &Scope) -> Result<Snapshot> {
  let mut seeds: Vec<Person> = Vec::new();
  let mut keys: BTreeSet<String> = BTreeSet::new();

  match scope {
    Scope::Person(id) => seeds.extend(person(conn, *id)?),
    Scope::Role(id) => {
      if let Some(role) = role(conn, *id)? {
        seeds.extend(person(conn, role.person_id)?);
      }
    }
    Scope::Household(key) => {
      keys.insert(key.clone());
    }
    Scope::Joining { person_id, key } => {
      seeds.extend(person(conn, *person_id)?);
      keys.insert(key.clone());
    }
  }
  keys.extend(seeds.iter().filter_map(|p| p.household_key.clone()));

  let mut people: Vec<Person> = seeds;
  for key in &keys {
    for member in household(conn, key)? {
      if !people.iter().any(|p| p.person_id == member.person_id) {
        people.push(member);
      }
    }
  }

  let mut roles = Vec::new();
  let mut entries = Vec::new();
  for p in &people {
    roles.extend(roles_of(conn, p.person_id)?);
    entries.extend(entries_of(conn, p.person_id)?);
  }

  Ok(Snapshot::new(people, groups(conn)?, roles, entries))
}

// ─── Writes ──────────────────────────────────────────────────────────────────

pub fn insert_person(conn: &Connection, p: &Person) -> Result<()> {
  conn.execute(
    &format!("INSERT INTO people ({PERSON_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
    params![
      encode_uuid(p.person_id),
      p.name,
      p.birthday.map(encode_date),
      p.household_key,
      p.main_person,
      p.newsletter_opt_in,
      p.fundraising_opt_in,
      encode_dt(p.created_at),
    ],
  )?;
  Ok(())
}

fn update_person(conn: &Connection, p: &Person) -> Result<()> {
  conn.execute(
    "UPDATE people SET
       household_key = ?2, main_person = ?3,
       newsletter_opt_in = ?4, fundraising_opt_in = ?5
     WHERE person_id = ?1",
    params![
      encode_uuid(p.person_id),
      p.household_key,
      p.main_person,
      p.newsletter_opt_in,
      p.fundraising_opt_in,
    ],
  )?;
  Ok(())
}

pub fn insert_group(conn: &Connection, g: &Group) -> Result<()> {
  conn.execute(
    &format!("INSERT INTO groups ({GROUP_COLUMNS}) VALUES (?1, ?2, ?3, ?4)"),
    params![encode_uuid(g.group_id), encode_uuid(g.layer_id), g.name, g.requires_approval],
  )?;
  Ok(())
}

fn insert_role(conn: &Connection, r: &Role) -> Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO roles ({ROLE_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
    ),
    params![
      encode_uuid(r.role_id),
      encode_uuid(r.person_id),
      encode_uuid(r.group_id),
      encode_uuid(r.layer_id),
      encode_kind(r.kind),
      r.category.map(encode_category),
      r.start_on.map(encode_date),
      r.end_on.map(encode_date),
      r.terminated,
      r.termination_reason,
      r.mutation_id.map(encode_uuid),
      r.deleted_at.map(encode_dt),
      encode_dt(r.created_at),
    ],
  )?;
  Ok(())
}

fn update_role(conn: &Connection, r: &Role) -> Result<()> {
  conn.execute(
    "UPDATE roles SET
       group_id = ?2, layer_id = ?3, kind = ?4, category = ?5,
       start_on = ?6, end_on = ?7, terminated = ?8, termination_reason = ?9,
       mutation_id = ?10, deleted_at = ?11
     WHERE role_id = ?1",
    params![
      encode_uuid(r.role_id),
      encode_uuid(r.group_id),
      encode_uuid(r.layer_id),
      encode_kind(r.kind),
      r.category.map(encode_category),
      r.start_on.map(encode_date),
      r.end_on.map(encode_date),
      r.terminated,
      r.termination_reason,
      r.mutation_id.map(encode_uuid),
      r.deleted_at.map(encode_dt),
    ],
  )?;
  Ok(())
}

fn delete_role(conn: &Connection, id: Uuid) -> Result<()> {
  let id = encode_uuid(id);
  conn.execute("DELETE FROM terminations WHERE role_id = ?1", params![id])?;
  conn.execute("DELETE FROM roles WHERE role_id = ?1", params![id])?;
  Ok(())
}

fn insert_entry(conn: &Connection, e: &TerminationEntry) -> Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO terminations ({ENTRY_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
    ),
    params![
      encode_uuid(e.entry_id),
      encode_uuid(e.mutation_id),
      encode_uuid(e.role_id),
      e.previous_end_on.map(encode_date),
      e.previous_terminated,
      e.previous_deleted_at.map(encode_dt),
      e.previous_reason,
      encode_dt(e.recorded_at),
      e.undone_at.map(encode_dt),
    ],
  )?;
  Ok(())
}

/// Write `changes`. Role writes go first so journal entries can reference
/// roles created in the same change set.
pub fn apply(conn: &Connection, changes: &ChangeSet) -> Result<()> {
  for change in &changes.roles {
    match change {
      RoleChange::Create(role) => insert_role(conn, role)?,
      RoleChange::Update(role) => update_role(conn, role)?,
      RoleChange::Delete(id) => delete_role(conn, *id)?,
    }
  }
  for person in &changes.people {
    update_person(conn, person)?;
  }
  for entry in &changes.journal {
    insert_entry(conn, entry)?;
  }
  let undone_at = encode_dt(changes.recorded_at);
  for entry_id in &changes.undone {
    conn.execute(
      "UPDATE terminations SET undone_at = ?2 WHERE entry_id = ?1",
      params![encode_uuid(*entry_id), undone_at],
    )?;
  }
  Ok(())
}
