//! The `RoleStore` trait and the outcome of a committed operation.
//!
//! The trait is implemented by storage backends (e.g. `sektion-store-sqlite`).
//! Consumers (the admin binary, host application adapters) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  membership::MembershipStatus,
  notify::Notification,
  operations::Operation,
  person::{Group, NewGroup, NewPerson, Person},
  role::Role,
  snapshot::{ChangeSet, RoleChange},
  validation::{ValidationError, ValidationErrors},
};

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// What a committed operation wrote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
  pub mutation_id:   Uuid,
  pub created:       Vec<Role>,
  pub updated:       Vec<Role>,
  pub deleted:       Vec<Uuid>,
  pub people:        Vec<Person>,
  /// Safe to dispatch: the transaction has committed.
  pub notifications: Vec<Notification>,
}

impl From<ChangeSet> for Outcome {
  fn from(changes: ChangeSet) -> Self {
    let mut outcome = Outcome {
      mutation_id: changes.mutation_id,
      people: changes.people,
      notifications: changes.notifications,
      ..Outcome::default()
    };
    for change in changes.roles {
      match change {
        RoleChange::Create(role) => outcome.created.push(role),
        RoleChange::Update(role) => outcome.updated.push(role),
        RoleChange::Delete(id) => outcome.deleted.push(id),
      }
    }
    outcome
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a membership store backend.
///
/// Role writes happen only through [`RoleStore::save`]: the backend loads
/// the operation's household, plans and validates it, and applies the
/// resulting change set in one transaction, holding a write lock for the
/// whole sequence so validation reads and writes see the same state.
///
/// `today` is always passed in; backends never read the calendar.
pub trait RoleStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Host-owned entities ───────────────────────────────────────────────

  fn add_group(
    &self,
    input: NewGroup,
  ) -> impl Future<Output = Result<Group, Self::Error>> + Send + '_;

  fn add_person(
    &self,
    input: NewPerson,
  ) -> impl Future<Output = Result<Person, Self::Error>> + Send + '_;

  fn get_person(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send + '_;

  fn list_people(&self) -> impl Future<Output = Result<Vec<Person>, Self::Error>> + Send + '_;

  /// Every distinct household key in use.
  fn list_households(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn get_role(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Role>, Self::Error>> + Send + '_;

  /// A person's roles; soft-deleted ones only with `include_inactive`.
  fn roles_for_person(
    &self,
    person_id: Uuid,
    include_inactive: bool,
  ) -> impl Future<Output = Result<Vec<Role>, Self::Error>> + Send + '_;

  /// Membership status as of `on`, answered by the SQL-backed facade.
  /// `None` if the person does not exist.
  fn membership_status(
    &self,
    person_id: Uuid,
    on: NaiveDate,
  ) -> impl Future<Output = Result<Option<MembershipStatus>, Self::Error>> + Send + '_;

  // ── Operations ────────────────────────────────────────────────────────

  /// Validate `op` without writing anything. An empty list means valid.
  fn dry_run<O: Operation>(
    &self,
    op: O,
    today: NaiveDate,
  ) -> impl Future<Output = Result<ValidationErrors, Self::Error>> + Send + '_;

  /// Plan, validate and commit `op` atomically. Fails with the validation
  /// errors instead of committing anything if `op` is invalid.
  fn save<O: Operation>(
    &self,
    op: O,
    today: NaiveDate,
  ) -> impl Future<Output = Result<Outcome, Self::Error>> + Send + '_;

  /// Re-validate every live role of a person against the current rules.
  fn audit(
    &self,
    person_id: Uuid,
    today: NaiveDate,
  ) -> impl Future<Output = Result<Vec<(Uuid, ValidationError)>, Self::Error>> + Send + '_;
}
