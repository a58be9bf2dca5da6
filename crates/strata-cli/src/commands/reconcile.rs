//! Reconcile command - merge changed customers into the SCD dimension.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Args;
use owo_colors::OwoColorize;
use strata_scd::schemas::warehouse_registry;
use strata_scd::{JsonLinesSource, ReconcileJob, ReconcileOutcome};

use super::{catalog_refresher, open_backend, print_outcome};
use crate::Config;

/// Arguments for the reconcile command.
#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Customer export (newline-delimited JSON).
    #[arg(long)]
    pub source: PathBuf,

    /// First `updated_at` date to include (YYYY-MM-DD).
    #[arg(long)]
    pub start: NaiveDate,

    /// Last `updated_at` date to include (YYYY-MM-DD).
    #[arg(long)]
    pub end: NaiveDate,

    /// Date versions open and close on. Defaults to today (UTC).
    #[arg(long)]
    pub run_date: Option<NaiveDate>,
}

/// Execute the reconcile command.
///
/// # Errors
///
/// Returns an error if the dimension is missing, the export is unreadable,
/// or the merge fails.
pub async fn execute(args: &ReconcileArgs, config: &Config) -> Result<()> {
    let backend = open_backend(config)?;
    let run_date = args.run_date.unwrap_or_else(|| Utc::now().date_naive());

    let job = ReconcileJob::new(
        backend,
        Arc::new(warehouse_registry()),
        Arc::new(JsonLinesSource::new(&args.source)),
    )
    .with_refresher(catalog_refresher(config));

    let outcome = job
        .run(args.start, args.end, run_date)
        .await
        .context("Reconcile failed")?;

    let text = match &outcome {
        ReconcileOutcome::NoChanges => format!("{}", "No changes; nothing written".dimmed()),
        ReconcileOutcome::Merged(stats) => format!(
            "{} {} closed, {} new versions, {} new customers",
            "Merged".green(),
            stats.closed,
            stats.new_versions,
            stats.new_keys
        ),
    };
    print_outcome(config, &text, &outcome)
}
