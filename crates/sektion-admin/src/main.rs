//! `sektion` operator binary.
//!
//! Reads `sektion.toml` (or the path given with `--config`), opens the SQLite
//! store and runs one batch job or query.
//!
//! ```text
//! sektion revalidate
//! sektion sync-families
//! sektion status 0b5c6f3e-... --on 2025-12-31
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sektion_admin::{AdminConfig, jobs};
use sektion_core::{notify::TracingNotifier, store::RoleStore};
use sektion_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "Membership store administration")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "sektion.toml")]
  config: PathBuf,

  /// Reference date for all rules; defaults to the local calendar day.
  #[arg(long, global = true)]
  today: Option<NaiveDate>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Re-check every stored role against the current rules.
  Revalidate,
  /// Propagate family memberships to household members lacking them.
  SyncFamilies,
  /// Print a person's membership status as JSON.
  Status {
    person_id: Uuid,
    /// Day to answer for; defaults to `--today`.
    #[arg(long)]
    on:        Option<NaiveDate>,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("SEKTION")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let admin_cfg: AdminConfig = settings
    .try_deserialize()
    .context("failed to deserialise AdminConfig")?;

  let store_path = expand_tilde(&admin_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?
    .with_thresholds(admin_cfg.thresholds.clone());

  let today = cli.today.unwrap_or_else(|| chrono::Local::now().date_naive());

  match cli.command {
    Command::Revalidate => {
      let report = jobs::revalidate(&store, today).await?;
      println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Command::SyncFamilies => {
      let report = jobs::sync_families(&store, &TracingNotifier, today).await?;
      println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Command::Status { person_id, on } => {
      let status = store
        .membership_status(person_id, on.unwrap_or(today))
        .await?
        .with_context(|| format!("no person {person_id}"))?;
      println!("{}", serde_json::to_string_pretty(&status)?);
    }
  }

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
