//! Init-table command - create an empty registry table.

use anyhow::{Context, Result};
use clap::Args;
use owo_colors::OwoColorize;
use serde_json::json;
use strata_scd::schemas::warehouse_registry;

use super::{open_backend, print_outcome};
use crate::Config;

/// Arguments for the init-table command.
#[derive(Debug, Args)]
pub struct InitTableArgs {
    /// Registry table name (e.g. `dim_customers_scd`).
    #[arg()]
    pub table: String,
}

/// Execute the init-table command.
///
/// # Errors
///
/// Returns an error if the table is unknown or already exists.
pub async fn execute(args: &InitTableArgs, config: &Config) -> Result<()> {
    let backend = open_backend(config)?;
    let registry = warehouse_registry();
    let version = strata_scd::create_table(&backend, &registry, &args.table)
        .await
        .with_context(|| format!("Failed to create table {}", args.table))?;

    print_outcome(
        config,
        &format!("{} {}", "Created".green(), args.table),
        &json!({ "table": args.table, "version": version }),
    )
}
