//! People and groups, the entities owned by the host application.
//!
//! The engine reads birthdays and household keys, and writes only the
//! main-person flag and the opt-ins recorded on termination.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A person as far as the membership engine is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
  pub person_id:           Uuid,
  pub name:                String,
  pub birthday:            Option<NaiveDate>,
  /// Persons sharing this key form a household.
  pub household_key:       Option<String>,
  /// The household's primary contact for the family membership.
  pub main_person:         bool,
  pub newsletter_opt_in:   bool,
  pub fundraising_opt_in:  bool,
  pub created_at:          DateTime<Utc>,
}

impl Person {
  /// Completed years of age on `on`; `None` without a birthday.
  pub fn years_on(&self, on: NaiveDate) -> Option<u32> {
    self.birthday.map(|b| on.years_since(b).unwrap_or(0))
  }

  pub fn shares_household_with(&self, other: &Person) -> bool {
    self.household_key.is_some() && self.household_key == other.household_key
  }
}

/// Input to [`crate::store::RoleStore::add_person`].
#[derive(Debug, Clone, Default)]
pub struct NewPerson {
  pub name:          String,
  pub birthday:      Option<NaiveDate>,
  pub household_key: Option<String>,
  pub main_person:   bool,
}

impl NewPerson {
  pub fn new(name: impl Into<String>, birthday: Option<NaiveDate>) -> Self {
    Self { name: name.into(), birthday, ..Self::default() }
  }

  pub fn in_household(mut self, key: impl Into<String>) -> Self {
    self.household_key = Some(key.into());
    self
  }
}

/// An organizational unit roles are attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
  pub group_id:          Uuid,
  /// The section (layer) this group belongs to.
  pub layer_id:          Uuid,
  pub name:              String,
  /// Joining creates a pending registration instead of a membership.
  pub requires_approval: bool,
}

/// Input to [`crate::store::RoleStore::add_group`]. Without a `layer_id`
/// the group is its own layer.
#[derive(Debug, Clone, Default)]
pub struct NewGroup {
  pub layer_id:          Option<Uuid>,
  pub name:              String,
  pub requires_approval: bool,
}
