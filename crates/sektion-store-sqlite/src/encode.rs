//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings with nanosecond precision, so they sort
//! lexically and survive a round trip unchanged. Calendar dates are
//! `YYYY-MM-DD`. Role kinds and categories use their snake_case names.
//! UUIDs are hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::Row;
use sektion_core::{
  person::{Group, Person},
  role::{Category, Role, RoleKind},
  snapshot::TerminationEntry,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

pub fn encode_kind(kind: RoleKind) -> String {
  let name: &str = kind.as_ref();
  name.to_owned()
}

fn decode_kind(s: &str) -> Result<RoleKind> {
  s.parse()
    .map_err(|e| Error::Decode(format!("role kind {s:?}: {e}")))
}

pub fn encode_category(category: Category) -> String {
  let name: &str = category.as_ref();
  name.to_owned()
}

fn decode_category(s: &str) -> Result<Category> {
  s.parse()
    .map_err(|e| Error::Decode(format!("category {s:?}: {e}")))
}

fn opt<T>(s: Option<String>, decode: impl Fn(&str) -> Result<T>) -> Result<Option<T>> {
  s.as_deref().map(decode).transpose()
}

// ─── Groups ──────────────────────────────────────────────────────────────────

pub const GROUP_COLUMNS: &str = "group_id, layer_id, name, requires_approval";

pub struct RawGroup {
  pub group_id:          String,
  pub layer_id:          String,
  pub name:              String,
  pub requires_approval: bool,
}

impl RawGroup {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      group_id:          row.get(0)?,
      layer_id:          row.get(1)?,
      name:              row.get(2)?,
      requires_approval: row.get(3)?,
    })
  }

  pub fn into_group(self) -> Result<Group> {
    Ok(Group {
      group_id:          decode_uuid(&self.group_id)?,
      layer_id:          decode_uuid(&self.layer_id)?,
      name:              self.name,
      requires_approval: self.requires_approval,
    })
  }
}

// ─── People ──────────────────────────────────────────────────────────────────

pub const PERSON_COLUMNS: &str = "person_id, name, birthday, household_key, main_person, \
                                  newsletter_opt_in, fundraising_opt_in, created_at";

pub struct RawPerson {
  pub person_id:          String,
  pub name:               String,
  pub birthday:           Option<String>,
  pub household_key:      Option<String>,
  pub main_person:        bool,
  pub newsletter_opt_in:  bool,
  pub fundraising_opt_in: bool,
  pub created_at:         String,
}

impl RawPerson {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      person_id:          row.get(0)?,
      name:               row.get(1)?,
      birthday:           row.get(2)?,
      household_key:      row.get(3)?,
      main_person:        row.get(4)?,
      newsletter_opt_in:  row.get(5)?,
      fundraising_opt_in: row.get(6)?,
      created_at:         row.get(7)?,
    })
  }

  pub fn into_person(self) -> Result<Person> {
    Ok(Person {
      person_id:          decode_uuid(&self.person_id)?,
      name:               self.name,
      birthday:           opt(self.birthday, decode_date)?,
      household_key:      self.household_key,
      main_person:        self.main_person,
      newsletter_opt_in:  self.newsletter_opt_in,
      fundraising_opt_in: self.fundraising_opt_in,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

// ─── Roles ───────────────────────────────────────────────────────────────────

pub const ROLE_COLUMNS: &str = "role_id, person_id, group_id, layer_id, kind, category, \
                                start_on, end_on, terminated, termination_reason, \
                                mutation_id, deleted_at, created_at";

/// Raw strings read directly from a `roles` row.
pub struct RawRole {
  pub role_id:            String,
  pub person_id:          String,
  pub group_id:           String,
  pub layer_id:           String,
  pub kind:               String,
  pub category:           Option<String>,
  pub start_on:           Option<String>,
  pub end_on:             Option<String>,
  pub terminated:         bool,
  pub termination_reason: Option<String>,
  pub mutation_id:        Option<String>,
  pub deleted_at:         Option<String>,
  pub created_at:         String,
}

impl RawRole {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      role_id:            row.get(0)?,
      person_id:          row.get(1)?,
      group_id:           row.get(2)?,
      layer_id:           row.get(3)?,
      kind:               row.get(4)?,
      category:           row.get(5)?,
      start_on:           row.get(6)?,
      end_on:             row.get(7)?,
      terminated:         row.get(8)?,
      termination_reason: row.get(9)?,
      mutation_id:        row.get(10)?,
      deleted_at:         row.get(11)?,
      created_at:         row.get(12)?,
    })
  }

  pub fn into_role(self) -> Result<Role> {
    Ok(Role {
      role_id:            decode_uuid(&self.role_id)?,
      person_id:          decode_uuid(&self.person_id)?,
      group_id:           decode_uuid(&self.group_id)?,
      layer_id:           decode_uuid(&self.layer_id)?,
      kind:               decode_kind(&self.kind)?,
      category:           opt(self.category, decode_category)?,
      start_on:           opt(self.start_on, decode_date)?,
      end_on:             opt(self.end_on, decode_date)?,
      terminated:         self.terminated,
      termination_reason: self.termination_reason,
      mutation_id:        opt(self.mutation_id, decode_uuid)?,
      deleted_at:         opt(self.deleted_at, decode_dt)?,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

// ─── Termination journal ─────────────────────────────────────────────────────

pub const ENTRY_COLUMNS: &str = "entry_id, mutation_id, role_id, previous_end_on, \
                                 previous_terminated, previous_deleted_at, previous_reason, \
                                 recorded_at, undone_at";

pub struct RawEntry {
  pub entry_id:            String,
  pub mutation_id:         String,
  pub role_id:             String,
  pub previous_end_on:     Option<String>,
  pub previous_terminated: bool,
  pub previous_deleted_at: Option<String>,
  pub previous_reason:     Option<String>,
  pub recorded_at:         String,
  pub undone_at:           Option<String>,
}

impl RawEntry {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entry_id:            row.get(0)?,
      mutation_id:         row.get(1)?,
      role_id:             row.get(2)?,
      previous_end_on:     row.get(3)?,
      previous_terminated: row.get(4)?,
      previous_deleted_at: row.get(5)?,
      previous_reason:     row.get(6)?,
      recorded_at:         row.get(7)?,
      undone_at:           row.get(8)?,
    })
  }

  pub fn into_entry(self) -> Result<TerminationEntry> {
    Ok(TerminationEntry {
      entry_id:            decode_uuid(&self.entry_id)?,
      mutation_id:         decode_uuid(&self.mutation_id)?,
      role_id:             decode_uuid(&self.role_id)?,
      previous_end_on:     opt(self.previous_end_on, decode_date)?,
      previous_terminated: self.previous_terminated,
      previous_deleted_at: opt(self.previous_deleted_at, decode_dt)?,
      previous_reason:     self.previous_reason,
      recorded_at:         decode_dt(&self.recorded_at)?,
      undone_at:           opt(self.undone_at, decode_dt)?,
    })
  }
}
