//! Drop-table command - delete every version of a registry table.

use anyhow::{Context, Result, bail};
use clap::Args;
use owo_colors::OwoColorize;
use serde_json::json;
use strata_scd::schemas::warehouse_registry;

use super::{open_backend, print_outcome};
use crate::Config;

/// Arguments for the drop-table command.
#[derive(Debug, Args)]
pub struct DropTableArgs {
    /// Registry table name (e.g. `future_orders`).
    #[arg()]
    pub table: String,

    /// Confirm the deletion.
    #[arg(long)]
    pub yes: bool,
}

/// Execute the drop-table command.
///
/// # Errors
///
/// Returns an error if `--yes` is missing, the table is unknown, or a
/// version cannot be deleted.
pub async fn execute(args: &DropTableArgs, config: &Config) -> Result<()> {
    if !args.yes {
        bail!("refusing to drop {} without --yes", args.table);
    }
    let backend = open_backend(config)?;
    let registry = warehouse_registry();
    let removed = strata_scd::drop_table(&backend, &registry, &args.table)
        .await
        .with_context(|| format!("Failed to drop table {}", args.table))?;

    let text = if removed == 0 {
        format!("{}", format!("{} does not exist; nothing dropped", args.table).dimmed())
    } else {
        format!("{} {} ({removed} versions)", "Dropped".red(), args.table)
    };
    print_outcome(
        config,
        &text,
        &json!({ "table": args.table, "versions_removed": removed }),
    )
}
