//! Role intervals: a person's time-bounded affiliation with a group.
//!
//! A role is pure data. Everything the validators and the query facade need
//! to know about it is exposed as a derived predicate here, so the same
//! answers come out whether the role is persisted or only hypothetical.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator};
use uuid::Uuid;

// ─── Dates ───────────────────────────────────────────────────────────────────

/// The end date materialised for roles that have no known end.
pub fn far_future() -> NaiveDate {
  NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// December 31st of the year `on` falls in.
pub fn end_of_year(on: NaiveDate) -> NaiveDate {
  NaiveDate::from_ymd_opt(on.year(), 12, 31).unwrap_or(on)
}

/// The day before `on`.
pub fn yesterday(on: NaiveDate) -> NaiveDate {
  on.checked_sub_days(Days::new(1)).unwrap_or(on)
}

/// An inclusive `[start, end]` range of calendar days.
///
/// Memberships end on their last valid day, so two ranges that merely touch
/// (one ends on the 31st, the next starts on the 1st) do not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end:   NaiveDate,
}

impl DateRange {
  pub fn new(start: NaiveDate, end: NaiveDate) -> Self { Self { start, end } }

  pub fn contains_day(&self, day: NaiveDate) -> bool {
    self.start <= day && day <= self.end
  }

  pub fn overlaps(&self, other: &DateRange) -> bool {
    self.start <= other.end && other.start <= self.end
  }

  /// True when every day of `other` is also a day of `self`.
  pub fn covers(&self, other: &DateRange) -> bool {
    self.start <= other.start && other.end <= self.end
  }
}

// ─── Kinds ───────────────────────────────────────────────────────────────────

/// Classification of a [`RoleKind`] consulted by the validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindFamily {
  /// Affiliation with the person's main section.
  Primary,
  /// Additional affiliation with another section.
  Secondary,
  /// Everything that is not a membership (honorary, benefactor, functions).
  Other,
}

/// The closed set of role kinds. The snake-case name is the `kind` column.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RoleKind {
  PrimaryMembership,
  PrimaryPendingRegistration,
  SecondaryMembership,
  SecondaryPendingRegistration,
  HonoraryMembership,
  BenefactorMembership,
  /// Board, presidency, and other leadership functions within a section.
  Functionary,
}

impl RoleKind {
  pub fn family(self) -> KindFamily {
    match self {
      Self::PrimaryMembership | Self::PrimaryPendingRegistration => {
        KindFamily::Primary
      }
      Self::SecondaryMembership | Self::SecondaryPendingRegistration => {
        KindFamily::Secondary
      }
      Self::HonoraryMembership | Self::BenefactorMembership | Self::Functionary => {
        KindFamily::Other
      }
    }
  }

  pub fn is_pending(self) -> bool {
    matches!(
      self,
      Self::PrimaryPendingRegistration | Self::SecondaryPendingRegistration
    )
  }

  /// Primary or secondary, pending or confirmed.
  pub fn is_membership(self) -> bool { self.family() != KindFamily::Other }

  /// Roles of this kind are destroyed together with the primary membership
  /// of the same layer when it is terminated.
  pub fn destroy_on_termination(self) -> bool {
    self.family() == KindFamily::Other
  }

  /// The confirmed kind a pending registration turns into.
  pub fn promoted(self) -> Option<RoleKind> {
    match self {
      Self::PrimaryPendingRegistration => Some(Self::PrimaryMembership),
      Self::SecondaryPendingRegistration => Some(Self::SecondaryMembership),
      _ => None,
    }
  }

  /// All kinds of the given family.
  pub fn of_family(family: KindFamily) -> Vec<RoleKind> {
    Self::iter().filter(|k| k.family() == family).collect()
  }

  /// The confirmed (non-pending) kinds of the given family.
  pub fn confirmed_of_family(family: KindFamily) -> Vec<RoleKind> {
    Self::iter()
      .filter(|k| k.family() == family && !k.is_pending())
      .collect()
  }

  /// The pending kinds of the given family.
  pub fn pending_of_family(family: KindFamily) -> Vec<RoleKind> {
    Self::iter()
      .filter(|k| k.family() == family && k.is_pending())
      .collect()
  }
}

// ─── Category ────────────────────────────────────────────────────────────────

/// Fee class attached to a membership role ("Beitragskategorie").
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
  Adult,
  Youth,
  Family,
}

impl Category {
  /// The category a person of `age` gets when joining.
  pub fn derive(age: u32, as_family: bool, youth_until_age: u32) -> Self {
    if as_family {
      Self::Family
    } else if age <= youth_until_age {
      Self::Youth
    } else {
      Self::Adult
    }
  }
}

// ─── Role ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
  pub role_id:            Uuid,
  pub person_id:          Uuid,
  /// The group (organizational unit) the role is attached to.
  pub group_id:           Uuid,
  /// The layer (section) owning `group_id`.
  pub layer_id:           Uuid,
  pub kind:               RoleKind,
  /// Set for membership kinds, `None` otherwise.
  pub category:           Option<Category>,
  pub start_on:           Option<NaiveDate>,
  pub end_on:             Option<NaiveDate>,
  /// Set only by the termination workflow, never by a plain end date.
  pub terminated:         bool,
  pub termination_reason: Option<String>,
  /// Correlates every role touched by the same termination.
  pub mutation_id:        Option<Uuid>,
  pub deleted_at:         Option<DateTime<Utc>>,
  pub created_at:         DateTime<Utc>,
}

impl Role {
  /// The inclusive validity interval, if both ends are known.
  pub fn active_period(&self) -> Option<DateRange> {
    Some(DateRange::new(self.start_on?, self.end_on?))
  }

  pub fn is_active(&self, on: NaiveDate) -> bool {
    !self.is_deleted()
      && self.start_on.is_none_or(|s| s <= on)
      && self.end_on.is_none_or(|e| on <= e)
  }

  /// Not deleted and not yet ended as of `on` (active or starting later).
  pub fn is_current_or_future(&self, on: NaiveDate) -> bool {
    !self.is_deleted() && self.end_on.is_none_or(|e| on <= e)
  }

  pub fn is_ended(&self, on: NaiveDate) -> bool {
    self.end_on.is_some_and(|e| e < on)
  }

  pub fn is_deleted(&self) -> bool { self.deleted_at.is_some() }

  pub fn is_terminated(&self) -> bool { self.terminated }

  pub fn is_family(&self) -> bool { self.category == Some(Category::Family) }

  pub fn is_primary(&self) -> bool { self.kind.family() == KindFamily::Primary }

  pub fn is_secondary(&self) -> bool {
    self.kind.family() == KindFamily::Secondary
  }

  /// A copy of this role for another person: fresh identity and creation
  /// time, no termination state.
  pub fn duplicate_for(&self, person_id: Uuid, now: DateTime<Utc>) -> Role {
    Role {
      role_id: Uuid::new_v4(),
      person_id,
      terminated: false,
      termination_reason: None,
      mutation_id: None,
      deleted_at: None,
      created_at: now,
      ..self.clone()
    }
  }
}

// ─── NewRole ─────────────────────────────────────────────────────────────────

/// Input for creating a role. `layer_id` is looked up from the group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRole {
  pub person_id: Uuid,
  pub group_id:  Uuid,
  pub kind:      RoleKind,
  pub category:  Option<Category>,
  pub start_on:  Option<NaiveDate>,
  pub end_on:    Option<NaiveDate>,
}

impl NewRole {
  /// Materialise the role in `layer_id`. A missing end is stored as
  /// [`far_future`].
  pub fn build(self, layer_id: Uuid, now: DateTime<Utc>) -> Role {
    Role {
      role_id: Uuid::new_v4(),
      person_id: self.person_id,
      group_id: self.group_id,
      layer_id,
      kind: self.kind,
      category: self.category,
      start_on: self.start_on,
      end_on: Some(self.end_on.unwrap_or_else(far_future)),
      terminated: false,
      termination_reason: None,
      mutation_id: None,
      deleted_at: None,
      created_at: now,
    }
  }
}
