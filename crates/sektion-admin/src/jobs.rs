//! Batch jobs over every person or household in a store.

use chrono::NaiveDate;
use sektion_core::{
  notify::{self, Notifier},
  operations::SyncHousehold,
  store::RoleStore,
};
use serde::Serialize;

/// Tally of one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobReport {
  /// People or households looked at.
  pub processed: usize,
  /// Validation findings, or roles created while syncing.
  pub changes:   usize,
  /// Units that failed and were skipped.
  pub failed:    usize,
}

/// Run every live role through the validation pipeline and log what no
/// longer holds. Nothing is written.
pub async fn revalidate<S: RoleStore>(store: &S, today: NaiveDate) -> Result<JobReport, S::Error> {
  let mut report = JobReport::default();

  for person in store.list_people().await? {
    report.processed += 1;
    match store.audit(person.person_id, today).await {
      Ok(findings) => {
        for (role_id, finding) in &findings {
          tracing::warn!(
            person_id = %person.person_id,
            %role_id,
            field = %finding.field,
            "{}",
            finding.key
          );
        }
        report.changes += findings.len();
      }
      Err(e) => {
        tracing::error!(person_id = %person.person_id, error = %e, "audit failed");
        report.failed += 1;
      }
    }
  }

  tracing::info!(?report, "revalidation finished");
  Ok(report)
}

/// Hand every household's family memberships to the members still lacking
/// them.
pub async fn sync_families<S, N>(
  store: &S,
  notifier: &N,
  today: NaiveDate,
) -> Result<JobReport, S::Error>
where
  S: RoleStore,
  N: Notifier,
{
  let mut report = JobReport::default();

  for key in store.list_households().await? {
    report.processed += 1;
    match notify::execute(store, notifier, SyncHousehold::new(key.clone()), today).await {
      Ok(outcome) => {
        if !outcome.created.is_empty() {
          tracing::info!(household = %key, created = outcome.created.len(), "household synced");
        }
        report.changes += outcome.created.len();
      }
      Err(e) => {
        tracing::error!(household = %key, error = %e, "household sync failed");
        report.failed += 1;
      }
    }
  }

  tracing::info!(?report, "family sync finished");
  Ok(report)
}
