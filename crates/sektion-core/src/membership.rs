//! Membership status queries that hide role kinds from callers.
//!
//! The facade runs against any [`RoleSource`]. Two adapters exist: the
//! eagerly loaded [`LoadedRoles`] (hypothetical role sets built by wizards
//! before anything is persisted) and the SQL-backed adapter of the storage
//! crate. Both apply the same [`RoleFilter`] semantics, so the answers are
//! identical before and after commit.

use std::convert::Infallible;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  person::Person,
  role::{Category, KindFamily, Role, RoleKind},
};

// ─── Filter ──────────────────────────────────────────────────────────────────

/// Which roles of one person a query is about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleFilter {
  /// Empty means every kind.
  pub kinds:           Vec<RoleKind>,
  /// Only roles whose period contains this day.
  pub active_on:       Option<NaiveDate>,
  /// Also match soft-deleted roles.
  pub include_deleted: bool,
}

impl RoleFilter {
  pub fn kinds(kinds: Vec<RoleKind>) -> Self { Self { kinds, ..Self::default() } }

  pub fn active_on(mut self, on: NaiveDate) -> Self {
    self.active_on = Some(on);
    self
  }

  pub fn with_inactive(mut self) -> Self {
    self.include_deleted = true;
    self
  }

  pub fn matches(&self, role: &Role) -> bool {
    (self.include_deleted || !role.is_deleted())
      && (self.kinds.is_empty() || self.kinds.contains(&role.kind))
      && self.active_on.is_none_or(|on| {
        role.start_on.is_none_or(|s| s <= on) && role.end_on.is_none_or(|e| on <= e)
      })
  }
}

// ─── Sources ─────────────────────────────────────────────────────────────────

/// The roles of a single person, queryable by [`RoleFilter`].
///
/// Results are ordered by start date, then creation time.
pub trait RoleSource {
  type Error;

  fn select(&self, filter: &RoleFilter) -> Result<Vec<Role>, Self::Error>;

  fn exists(&self, filter: &RoleFilter) -> Result<bool, Self::Error> {
    Ok(!self.select(filter)?.is_empty())
  }
}

/// Adapter over roles that are already in memory.
#[derive(Debug, Clone, Copy)]
pub struct LoadedRoles<'a> {
  roles:     &'a [Role],
  person_id: Uuid,
}

impl<'a> LoadedRoles<'a> {
  pub fn new(roles: &'a [Role], person_id: Uuid) -> Self { Self { roles, person_id } }
}

impl RoleSource for LoadedRoles<'_> {
  type Error = Infallible;

  fn select(&self, filter: &RoleFilter) -> Result<Vec<Role>, Infallible> {
    let mut roles: Vec<Role> = self
      .roles
      .iter()
      .filter(|r| r.person_id == self.person_id && filter.matches(r))
      .cloned()
      .collect();
    roles.sort_by_key(|r| (r.start_on, r.created_at));
    Ok(roles)
  }

  fn exists(&self, filter: &RoleFilter) -> Result<bool, Infallible> {
    Ok(
      self
        .roles
        .iter()
        .any(|r| r.person_id == self.person_id && filter.matches(r)),
    )
  }
}

// ─── Facade ──────────────────────────────────────────────────────────────────

/// Read-only answers about one person's membership as of a given day.
pub struct Membership<'p, S> {
  person: &'p Person,
  source: S,
  on:     NaiveDate,
}

impl<'p, S: RoleSource> Membership<'p, S> {
  pub fn new(person: &'p Person, source: S, on: NaiveDate) -> Self {
    Self { person, source, on }
  }

  fn first(&self, filter: RoleFilter) -> Result<Option<Role>, S::Error> {
    Ok(self.source.select(&filter)?.into_iter().next())
  }

  pub fn active_primary_role(&self) -> Result<Option<Role>, S::Error> {
    self.first(
      RoleFilter::kinds(RoleKind::confirmed_of_family(KindFamily::Primary))
        .active_on(self.on),
    )
  }

  pub fn active_secondary_roles(&self) -> Result<Vec<Role>, S::Error> {
    self.source.select(
      &RoleFilter::kinds(RoleKind::confirmed_of_family(KindFamily::Secondary))
        .active_on(self.on),
    )
  }

  pub fn pending_primary_role(&self) -> Result<Option<Role>, S::Error> {
    self.first(
      RoleFilter::kinds(RoleKind::pending_of_family(KindFamily::Primary))
        .active_on(self.on),
    )
  }

  pub fn pending_secondary_roles(&self) -> Result<Vec<Role>, S::Error> {
    self.source.select(
      &RoleFilter::kinds(RoleKind::pending_of_family(KindFamily::Secondary))
        .active_on(self.on),
    )
  }

  /// True if a confirmed primary membership exists at all: current, future,
  /// or ended and deleted.
  pub fn is_member_anytime(&self) -> Result<bool, S::Error> {
    self.source.exists(
      &RoleFilter::kinds(RoleKind::confirmed_of_family(KindFamily::Primary))
        .with_inactive(),
    )
  }

  pub fn is_terminated(&self) -> Result<bool, S::Error> {
    Ok(self.active_primary_role()?.is_some_and(|r| r.is_terminated()))
  }

  pub fn is_family(&self) -> Result<bool, S::Error> {
    Ok(self.active_primary_role()?.is_some_and(|r| r.is_family()))
  }

  /// The household key with its family prefix, for family members only.
  pub fn family_id(&self) -> Result<Option<String>, S::Error> {
    if !self.is_family()? {
      return Ok(None);
    }
    Ok(self.person.household_key.as_deref().map(family_id))
  }

  /// Whether this person receives membership invoices: the household's main
  /// person does, and so does anyone with an active non-family membership.
  pub fn is_invoiceable(&self) -> Result<bool, S::Error> {
    if self.person.main_person && self.is_family()? {
      return Ok(true);
    }
    Ok(
      self
        .source
        .select(&RoleFilter::default().active_on(self.on))?
        .iter()
        .any(|r| r.kind.is_membership() && r.category.is_some_and(|c| c != Category::Family)),
    )
  }

  pub fn status(&self) -> Result<MembershipStatus, S::Error> {
    Ok(MembershipStatus {
      person_id:               self.person.person_id,
      on:                      self.on,
      active_primary_role:     self.active_primary_role()?,
      active_secondary_roles:  self.active_secondary_roles()?,
      pending_primary_role:    self.pending_primary_role()?,
      pending_secondary_roles: self.pending_secondary_roles()?,
      member_anytime:          self.is_member_anytime()?,
      terminated:              self.is_terminated()?,
      family:                  self.is_family()?,
      family_id:               self.family_id()?,
      invoiceable:             self.is_invoiceable()?,
    })
  }
}

/// Household key normalised with the family scope prefix.
pub fn family_id(household_key: &str) -> String { format!("F{household_key}") }

/// Serialisable projection of [`Membership`] for read-only consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipStatus {
  pub person_id:               Uuid,
  pub on:                      NaiveDate,
  pub active_primary_role:     Option<Role>,
  pub active_secondary_roles:  Vec<Role>,
  pub pending_primary_role:    Option<Role>,
  pub pending_secondary_roles: Vec<Role>,
  pub member_anytime:          bool,
  pub terminated:              bool,
  pub family:                  bool,
  pub family_id:               Option<String>,
  pub invoiceable:             bool,
}
