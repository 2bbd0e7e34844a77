//! Post-commit notifications.
//!
//! Operations describe who should hear about what in their change set; the
//! store hands the list back only once the transaction has committed. Mail
//! delivery is someone else's problem.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  operations::Operation,
  store::{Outcome, RoleStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
  MembershipCreated,
  PrimarySectionSwitched,
  SectionsSwapped,
  SecondaryJoined,
  RegistrationPending,
  SecondaryLeft,
  MembershipTerminated,
  TerminationRevoked,
  RegistrationConfirmed,
  FamilyMembershipStarted,
}

/// A person / group / date triple for the mailer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub event:     Event,
  pub person_id: Uuid,
  pub group_id:  Uuid,
  pub on:        NaiveDate,
}

impl Notification {
  pub fn new(event: Event, person_id: Uuid, group_id: Uuid, on: NaiveDate) -> Self {
    Self { event, person_id, group_id, on }
  }
}

pub trait Notifier: Send + Sync {
  fn deliver(&self, notification: &Notification);
}

/// Writes every notification to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
  fn deliver(&self, n: &Notification) {
    tracing::info!(
      event = ?n.event,
      person_id = %n.person_id,
      group_id = %n.group_id,
      on = %n.on,
      "membership notification"
    );
  }
}

/// Commit `op` and, only if that succeeded, dispatch its notifications.
pub async fn execute<S, N, O>(
  store: &S,
  notifier: &N,
  op: O,
  today: NaiveDate,
) -> Result<Outcome, S::Error>
where
  S: RoleStore,
  N: Notifier,
  O: Operation,
{
  let outcome = store.save(op, today).await?;
  for notification in &outcome.notifications {
    notifier.deliver(notification);
  }
  Ok(outcome)
}
