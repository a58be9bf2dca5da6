//! Load command - replace a table's content from a JSON-lines file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use owo_colors::OwoColorize;
use strata_scd::schemas::warehouse_registry;

use super::{open_backend, print_outcome};
use crate::Config;

/// Arguments for the load command.
#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Registry table name (e.g. `orders`).
    #[arg()]
    pub table: String,

    /// Newline-delimited JSON file, one row per line.
    #[arg()]
    pub path: PathBuf,
}

/// Execute the load command.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not fit the schema.
pub async fn execute(args: &LoadArgs, config: &Config) -> Result<()> {
    let backend = open_backend(config)?;
    let registry = warehouse_registry();
    let outcome = strata_scd::load_json_lines(&backend, &registry, &args.table, &args.path)
        .await
        .with_context(|| format!("Failed to load {} into {}", args.path.display(), args.table))?;

    print_outcome(
        config,
        &format!(
            "{} {} rows into {} (version {})",
            "Loaded".green(),
            outcome.rows,
            args.table,
            outcome.version
        ),
        &outcome,
    )
}
