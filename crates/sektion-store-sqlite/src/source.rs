//! [`SqlRoles`]: the membership facade's role source backed by SQL.
//!
//! Each [`RoleFilter`] is translated into a `WHERE` clause, so the facade
//! only ever fetches the rows a query is about. The clauses mirror
//! [`RoleFilter::matches`] exactly; the facade answers the same before and
//! after a change set is committed.

use rusqlite::{Connection, params_from_iter};
use sektion_core::{
  membership::{RoleFilter, RoleSource},
  role::Role,
};
use uuid::Uuid;

use crate::{
  Error,
  encode::{ROLE_COLUMNS, RawRole, encode_date, encode_kind, encode_uuid},
};

/// The roles of one person, read lazily through `conn`.
pub struct SqlRoles<'c> {
  conn:      &'c Connection,
  person_id: Uuid,
}

impl<'c> SqlRoles<'c> {
  pub fn new(conn: &'c Connection, person_id: Uuid) -> Self { Self { conn, person_id } }
}

/// `WHERE` clause and positional arguments for `filter`. Every argument is
/// text, since UUIDs, kinds and dates all are.
fn where_clause(person_id: Uuid, filter: &RoleFilter) -> (String, Vec<String>) {
  let mut conds = vec!["person_id = ?1".to_owned()];
  let mut args = vec![encode_uuid(person_id)];

  if !filter.include_deleted {
    conds.push("deleted_at IS NULL".to_owned());
  }
  if !filter.kinds.is_empty() {
    let first = args.len() + 1;
    let slots: Vec<String> = (first..first + filter.kinds.len())
      .map(|i| format!("?{i}"))
      .collect();
    conds.push(format!("kind IN ({})", slots.join(", ")));
    args.extend(filter.kinds.iter().copied().map(encode_kind));
  }
  if let Some(on) = filter.active_on {
    let slot = args.len() + 1;
    conds.push(format!(
      "(start_on IS NULL OR start_on <= ?{slot}) AND (end_on IS NULL OR end_on >= ?{slot})"
    ));
    args.push(encode_date(on));
  }

  (conds.join(" AND "), args)
}

impl RoleSource for SqlRoles<'_> {
  type Error = Error;

  fn select(&self, filter: &RoleFilter) -> Result<Vec<Role>, Error> {
    let (clause, args) = where_clause(self.person_id, filter);
    let mut stmt = self.conn.prepare(&format!(
      "SELECT {ROLE_COLUMNS} FROM roles WHERE {clause} ORDER BY start_on, created_at"
    ))?;
    let raws = stmt
      .query_map(params_from_iter(args.iter()), RawRole::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawRole::into_role).collect()
  }

  fn exists(&self, filter: &RoleFilter) -> Result<bool, Error> {
    let (clause, args) = where_clause(self.person_id, filter);
    let found: bool = self.conn.query_row(
      &format!("SELECT EXISTS (SELECT 1 FROM roles WHERE {clause})"),
      params_from_iter(args.iter()),
      |row| row.get(0),
    )?;
    Ok(found)
  }
}
