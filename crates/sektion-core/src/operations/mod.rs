//! Transition operations: named, atomic membership lifecycle changes.
//!
//! Each operation is a small command value holding the identifiers it acts
//! on. [`Operation::plan`] checks its preconditions against a [`Snapshot`]
//! and describes the effect as a [`ChangeSet`]; [`prepare`] then validates
//! every role the change set creates or modifies against the resulting
//! role set. Nothing in this module writes anywhere. Stores run [`prepare`]
//! inside their transaction and commit the change set only if it succeeds.

mod create;
mod family;
mod promote;
mod secondary;
mod switch;
mod terminate;

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

pub use create::{CreateRole, RemoveRole};
pub use family::{AssignMainPerson, ConvertSecondaryToFamily, JoinHousehold, SyncHousehold};
pub use promote::PromotePendingRegistration;
pub use secondary::{JoinSecondarySection, LeaveSecondarySection};
pub use switch::{SwapPrimarySecondary, SwitchPrimarySection};
pub use terminate::{TerminateMembership, TerminateOn, UndoTermination};

use crate::{
  Error, Result,
  config::Thresholds,
  person::Person,
  role::Role,
  snapshot::{ChangeSet, RoleChange, Snapshot},
  validation::{
    CoverageValidator, ErrorKey, Field, Pipeline, ValidationContext, ValidationErrors,
    ValidationMode, Validator,
  },
};

/// What a store must load before planning an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
  /// The person and their household.
  Person(Uuid),
  /// The role's person and their household.
  Role(Uuid),
  /// Every member of the household `key`.
  Household(String),
  /// The person, their current household, and the household `key`.
  Joining { person_id: Uuid, key: String },
}

/// Inputs shared by every operation: the role set, the reference date and
/// the identifier stamped on everything the operation writes.
pub struct Context<'a> {
  pub snapshot:    &'a Snapshot,
  pub today:       NaiveDate,
  pub now:         DateTime<Utc>,
  pub thresholds:  &'a Thresholds,
  pub mutation_id: Uuid,
}

impl Context<'_> {
  pub fn change_set(&self) -> ChangeSet { ChangeSet::new(self.mutation_id, self.now) }

  fn person(&self, id: Uuid) -> Result<&Person> { self.snapshot.require_person(id) }

  fn role(&self, id: Uuid) -> Result<&Role> { self.snapshot.require_role(id) }

  /// The person's confirmed primary membership active today.
  fn active_primary(&self, person_id: Uuid) -> Option<&Role> {
    self.snapshot.roles_of(person_id).find(|r| {
      r.is_primary() && !r.kind.is_pending() && r.is_active(self.today)
    })
  }

  fn age_of(&self, person: &Person) -> u32 { person.years_on(self.today).unwrap_or(0) }
}

pub trait Operation: Send + 'static {
  fn scope(&self) -> Scope;

  /// Check preconditions and describe the effect. Precondition failures are
  /// returned as [`Error::Invalid`].
  fn plan(&self, ctx: &Context<'_>) -> Result<ChangeSet>;

  fn validation_mode(&self) -> ValidationMode { ValidationMode::Standard }
}

/// Plan `op` and validate the outcome. The returned change set is safe to
/// commit against the snapshot in `ctx`.
pub fn prepare<O: Operation + ?Sized>(op: &O, ctx: &Context<'_>) -> Result<ChangeSet> {
  let changes = op.plan(ctx)?;
  let after = ctx.snapshot.apply(&changes);
  let vctx = ValidationContext {
    snapshot:   &after,
    today:      ctx.today,
    thresholds: ctx.thresholds,
  };

  let full = Pipeline::for_mode(op.validation_mode());
  let temporal = Pipeline::temporal();
  let mut errors = ValidationErrors::new();

  for change in &changes.roles {
    match change {
      RoleChange::Create(role) if !role.is_deleted() => {
        errors.extend(full.run(role, &vctx));
      }
      RoleChange::Update(role) if !role.is_deleted() => {
        let reshaped = ctx.snapshot.role(role.role_id).is_none_or(|before| {
          before.category != role.category
            || before.group_id != role.group_id
            || before.kind != role.kind
        });
        let pipeline = if reshaped { &full } else { &temporal };
        errors.extend(pipeline.run(role, &vctx));
      }
      _ => {}
    }
  }

  // Removing a primary must not strand the person's remaining secondaries.
  let stripped: BTreeSet<Uuid> = changes
    .roles
    .iter()
    .filter(|change| match change {
      RoleChange::Create(_) => false,
      RoleChange::Update(role) => role.is_deleted(),
      RoleChange::Delete(_) => true,
    })
    .filter_map(|change| ctx.snapshot.role(change.role_id()))
    .filter(|before| before.is_primary() && !before.is_deleted())
    .map(|before| before.person_id)
    .collect();
  for person_id in stripped {
    let left: Vec<&Role> = after
      .roles_of(person_id)
      .filter(|r| r.is_secondary() && r.is_current_or_future(ctx.today))
      .filter(|r| !changes.touches(r.role_id))
      .collect();
    for secondary in left {
      errors.extend(CoverageValidator.validate(secondary, &vctx));
    }
  }

  errors.into_result()?;
  Ok(changes)
}

/// Dry run: the validation errors `op` would produce, empty when valid.
///
/// Only data-integrity and lookup failures are returned as `Err`.
pub fn check<O: Operation + ?Sized>(op: &O, ctx: &Context<'_>) -> Result<ValidationErrors> {
  match prepare(op, ctx) {
    Ok(_) => Ok(ValidationErrors::new()),
    Err(Error::Invalid(errors)) => Ok(errors),
    Err(other) => Err(other),
  }
}

fn invalid(field: Field, key: ErrorKey) -> Error {
  let mut errors = ValidationErrors::new();
  errors.add(field, key);
  Error::Invalid(errors)
}
