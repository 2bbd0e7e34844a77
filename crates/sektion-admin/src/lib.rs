//! Operator tooling for the membership store.
//!
//! Batch jobs that re-check stored data against the current rules. Each
//! person or household is processed on its own: a failure is logged and
//! counted, and the job carries on with the next one.

pub mod jobs;

use std::path::PathBuf;

use sektion_core::config::Thresholds;
use serde::Deserialize;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `sektion.toml` and `SEKTION_*`
/// environment variables.
#[derive(Deserialize, Clone, Debug)]
pub struct AdminConfig {
  pub store_path: PathBuf,
  #[serde(default)]
  pub thresholds: Thresholds,
}
