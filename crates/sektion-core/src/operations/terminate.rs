use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Context, Operation, Scope, invalid};
use crate::{
  Error, Result,
  household,
  notify::{Event, Notification},
  role::{Role, RoleKind, end_of_year, yesterday},
  snapshot::{ChangeSet, TerminationEntry},
  validation::{ErrorKey, Field, ValidationErrors},
};

/// When a termination takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminateOn {
  /// The role ends yesterday.
  Now,
  /// The role ends on December 31st of the current year.
  EndOfYear,
}

impl TerminateOn {
  pub fn resolve(self, today: NaiveDate) -> NaiveDate {
    match self {
      Self::Now => yesterday(today),
      Self::EndOfYear => end_of_year(today),
    }
  }
}

/// Terminate `role` on `end_on` (or earlier, if it already ends earlier) and
/// journal its previous state under the context's mutation id. A role that
/// would end before it starts is soft deleted with its dates untouched.
pub(super) fn end_role(
  changes: &mut ChangeSet,
  role: &Role,
  end_on: NaiveDate,
  reason: Option<String>,
  ctx: &Context<'_>,
) {
  changes
    .journal
    .push(TerminationEntry::record(ctx.mutation_id, role, ctx.now));

  let mut ended = role.clone();
  ended.mutation_id = Some(ctx.mutation_id);
  ended.terminated = true;
  ended.termination_reason = reason;

  let end_on = role.end_on.map_or(end_on, |e| e.min(end_on));
  if role.start_on.is_some_and(|s| end_on < s) {
    ended.deleted_at = Some(ctx.now);
  } else {
    ended.end_on = Some(end_on);
    if end_on < ctx.today {
      ended.deleted_at = Some(ctx.now);
    }
  }
  changes.update(ended);
}

/// Destroy `role` right away, whatever the termination date, keeping it as a
/// soft deleted row so the journal entry can bring it back.
fn remove_role(changes: &mut ChangeSet, role: &Role, ctx: &Context<'_>) {
  changes
    .journal
    .push(TerminationEntry::record(ctx.mutation_id, role, ctx.now));
  household::destroy_one(changes, role, ctx.today, ctx.now, true);
}

/// Terminate a primary membership with everything hanging off it.
#[derive(Debug, Clone)]
pub struct TerminateMembership {
  pub role_id:               Uuid,
  pub terminate_on:          TerminateOn,
  pub reason:                Option<String>,
  pub subscribe_newsletter:  bool,
  pub subscribe_fundraising: bool,
}

impl TerminateMembership {
  pub fn new(role_id: Uuid, terminate_on: TerminateOn) -> Self {
    Self {
      role_id,
      terminate_on,
      reason: None,
      subscribe_newsletter: false,
      subscribe_fundraising: false,
    }
  }
}

impl Operation for TerminateMembership {
  fn scope(&self) -> Scope { Scope::Role(self.role_id) }

  fn plan(&self, ctx: &Context<'_>) -> Result<ChangeSet> {
    let role = ctx.role(self.role_id)?;
    let person = ctx.person(role.person_id)?;

    let mut errors = ValidationErrors::new();
    if role.kind != RoleKind::PrimaryMembership {
      errors.add(Field::Role, ErrorKey::NotPrimary);
    } else if !role.is_active(ctx.today) {
      errors.add(Field::Role, ErrorKey::NotActive);
    } else if role.is_terminated() {
      errors.add(Field::Role, ErrorKey::AlreadyTerminated);
    }
    let end_on = self.terminate_on.resolve(ctx.today);
    if role.start_on.is_some_and(|s| end_on < s) {
      errors.add(Field::EndOn, ErrorKey::TerminationBeforeStart);
    }
    errors.into_result()?;

    let members = if role.is_family() {
      household::family_members(ctx.snapshot, person, ctx.today)
    } else {
      vec![person.person_id]
    };

    let mut changes = ctx.change_set();
    for member_id in &members {
      let affected: Vec<&Role> = ctx
        .snapshot
        .roles_of(*member_id)
        .filter(|r| r.is_current_or_future(ctx.today) && !r.is_terminated())
        .filter(|r| {
          let own_primary = r.kind == role.kind && r.group_id == role.group_id;
          let on_layer = r.kind.destroy_on_termination() && r.layer_id == role.layer_id;
          own_primary || r.is_secondary() || on_layer
        })
        .collect();

      for r in affected {
        if changes.touches(r.role_id) {
          continue;
        }
        if r.kind.destroy_on_termination() {
          remove_role(&mut changes, r, ctx);
        } else {
          end_role(&mut changes, r, end_on, self.reason.clone(), ctx);
        }
      }
      changes.notify(Notification::new(
        Event::MembershipTerminated,
        *member_id,
        role.group_id,
        end_on,
      ));
    }

    if self.subscribe_newsletter || self.subscribe_fundraising {
      let mut updated = person.clone();
      updated.newsletter_opt_in |= self.subscribe_newsletter;
      updated.fundraising_opt_in |= self.subscribe_fundraising;
      changes.update_person(updated);
    }
    Ok(changes)
  }
}

/// Revert a termination: every role touched by the same mutation gets its
/// journaled state back.
#[derive(Debug, Clone)]
pub struct UndoTermination {
  pub role_id: Uuid,
}

impl UndoTermination {
  pub fn new(role_id: Uuid) -> Self { Self { role_id } }
}

impl Operation for UndoTermination {
  fn scope(&self) -> Scope { Scope::Role(self.role_id) }

  fn plan(&self, ctx: &Context<'_>) -> Result<ChangeSet> {
    let role = ctx.role(self.role_id)?;
    if !role.is_terminated() {
      return Err(invalid(Field::Role, ErrorKey::NotTerminated));
    }

    let not_found = || {
      tracing::error!(
        role_id = %role.role_id,
        person_id = %role.person_id,
        group_id = %role.group_id,
        mutation_id = ?role.mutation_id,
        "terminated role has no unique open termination entry"
      );
      Error::MutationNotFound(role.role_id)
    };

    let mutation_id = role.mutation_id.ok_or_else(not_found)?;
    let entries: Vec<&TerminationEntry> = ctx.snapshot.open_entries(mutation_id).collect();
    let own = entries.iter().filter(|e| e.role_id == role.role_id).count();
    if own != 1 {
      return Err(not_found());
    }

    let mut changes = ctx.change_set();
    for entry in entries {
      let Some(current) = ctx.snapshot.role(entry.role_id) else {
        tracing::warn!(
          role_id = %entry.role_id,
          %mutation_id,
          "journaled role no longer exists, skipping"
        );
        continue;
      };
      let mut restored = current.clone();
      restored.end_on = entry.previous_end_on;
      restored.terminated = entry.previous_terminated;
      restored.deleted_at = entry.previous_deleted_at;
      restored.termination_reason = entry.previous_reason.clone();
      restored.mutation_id = None;
      changes.update(restored);
      changes.undone.push(entry.entry_id);
    }

    changes.notify(Notification::new(
      Event::TerminationRevoked,
      role.person_id,
      role.group_id,
      ctx.today,
    ));
    Ok(changes)
  }
}
