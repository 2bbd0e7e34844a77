//! [`SqliteStore`]: the SQLite implementation of [`RoleStore`].

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::TransactionBehavior;
use uuid::Uuid;

use sektion_core::{
  config::Thresholds,
  membership::{MembershipStatus, Membership},
  operations::{self, Context, Operation, Scope},
  person::{Group, NewGroup, NewPerson, Person},
  role::Role,
  store::{Outcome, RoleStore},
  validation::{self, ValidationContext, ValidationError, ValidationErrors},
};

use crate::{Result, load, schema::SCHEMA, source::SqlRoles};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A membership store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  thresholds:      Thresholds,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, thresholds: Thresholds::default() })
  }

  /// Replace the default age and family thresholds.
  pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
    self.thresholds = thresholds;
    self
  }

  pub fn thresholds(&self) -> &Thresholds { &self.thresholds }
}

// ─── RoleStore impl ──────────────────────────────────────────────────────────

impl RoleStore for SqliteStore {
  type Error = crate::Error;

  // ── Host-owned entities ───────────────────────────────────────────────

  async fn add_group(&self, input: NewGroup) -> Result<Group> {
    let group_id = Uuid::new_v4();
    let group = Group {
      group_id,
      layer_id: input.layer_id.unwrap_or(group_id),
      name: input.name,
      requires_approval: input.requires_approval,
    };

    let row = group.clone();
    self
      .conn
      .call(move |conn| Ok(load::insert_group(conn, &row)))
      .await??;
    Ok(group)
  }

  async fn add_person(&self, input: NewPerson) -> Result<Person> {
    let person = Person {
      person_id:          Uuid::new_v4(),
      name:               input.name,
      birthday:           input.birthday,
      household_key:      input.household_key,
      main_person:        input.main_person,
      newsletter_opt_in:  false,
      fundraising_opt_in: false,
      created_at:         Utc::now(),
    };

    let row = person.clone();
    self
      .conn
      .call(move |conn| Ok(load::insert_person(conn, &row)))
      .await??;
    Ok(person)
  }

  async fn get_person(&self, id: Uuid) -> Result<Option<Person>> {
    self.conn.call(move |conn| Ok(load::person(conn, id))).await?
  }

  async fn list_people(&self) -> Result<Vec<Person>> {
    self.conn.call(|conn| Ok(load::people(conn))).await?
  }

  async fn list_households(&self) -> Result<Vec<String>> {
    self.conn.call(|conn| Ok(load::household_keys(conn))).await?
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  async fn get_role(&self, id: Uuid) -> Result<Option<Role>> {
    self.conn.call(move |conn| Ok(load::role(conn, id))).await?
  }

  async fn roles_for_person(&self, person_id: Uuid, include_inactive: bool) -> Result<Vec<Role>> {
    let mut roles = self
      .conn
      .call(move |conn| Ok(load::roles_of(conn, person_id)))
      .await??;
    if !include_inactive {
      roles.retain(|r| !r.is_deleted());
    }
    Ok(roles)
  }

  async fn membership_status(
    &self,
    person_id: Uuid,
    on: NaiveDate,
  ) -> Result<Option<MembershipStatus>> {
    self
      .conn
      .call(move |conn| {
        let status = || -> Result<Option<MembershipStatus>> {
          let Some(person) = load::person(conn, person_id)? else {
            return Ok(None);
          };
          let facade = Membership::new(&person, SqlRoles::new(conn, person_id), on);
          Ok(Some(facade.status()?))
        };
        Ok(status())
      })
      .await?
  }

  // ── Operations ────────────────────────────────────────────────────────

  async fn dry_run<O: Operation>(&self, op: O, today: NaiveDate) -> Result<ValidationErrors> {
    let thresholds = self.thresholds.clone();
    let errors = self
      .conn
      .call(move |conn| {
        // Deferred and never committed: a consistent read, nothing else.
        let tx = conn.transaction()?;
        let check = || -> Result<ValidationErrors> {
          let snapshot = load::snapshot(&tx, &op.scope())?;
          let ctx = Context {
            snapshot:    &snapshot,
            today,
            now:         Utc::now(),
            thresholds:  &thresholds,
            mutation_id: Uuid::new_v4(),
          };
          Ok(operations::check(&op, &ctx)?)
        };
        Ok(check())
      })
      .await??;
    tracing::debug!(errors = errors.len(), "dry run");
    Ok(errors)
  }

  async fn save<O: Operation>(&self, op: O, today: NaiveDate) -> Result<Outcome> {
    let thresholds = self.thresholds.clone();
    let outcome = self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock up front, so nothing can change
        // between loading the household and writing the change set.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let write = || -> Result<Outcome> {
          let snapshot = load::snapshot(&tx, &op.scope())?;
          let ctx = Context {
            snapshot:    &snapshot,
            today,
            now:         Utc::now(),
            thresholds:  &thresholds,
            mutation_id: Uuid::new_v4(),
          };
          let changes = operations::prepare(&op, &ctx)?;
          load::apply(&tx, &changes)?;
          Ok(Outcome::from(changes))
        };
        // Dropping an uncommitted transaction rolls it back.
        let outcome = match write() {
          Ok(outcome) => outcome,
          Err(e) => return Ok(Err(e)),
        };
        tx.commit()?;
        Ok(Ok(outcome))
      })
      .await??;

    tracing::info!(
      mutation_id = %outcome.mutation_id,
      created = outcome.created.len(),
      updated = outcome.updated.len(),
      deleted = outcome.deleted.len(),
      "committed membership change"
    );
    Ok(outcome)
  }

  async fn audit(&self, person_id: Uuid, today: NaiveDate) -> Result<Vec<(Uuid, ValidationError)>> {
    let thresholds = self.thresholds.clone();
    self
      .conn
      .call(move |conn| {
        let findings = || -> Result<Vec<(Uuid, ValidationError)>> {
          let snapshot = load::snapshot(conn, &Scope::Person(person_id))?;
          let ctx = ValidationContext { snapshot: &snapshot, today, thresholds: &thresholds };
          Ok(validation::audit(person_id, &ctx))
        };
        Ok(findings())
      })
      .await?
  }
}
