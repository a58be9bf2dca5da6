//! Show command - print a table's current content.

use anyhow::{Context, Result, bail};
use arrow::array::{Array, BooleanArray};
use arrow::compute::filter_record_batch;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use clap::Args;
use owo_colors::OwoColorize;
use strata_scd::jobs::resolve_table;
use strata_scd::schemas::{columns, warehouse_registry};

use super::open_backend;
use crate::{Config, OutputFormat};

/// Arguments for the show command.
#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Registry table name.
    #[arg()]
    pub table: String,

    /// Only rows whose `is_active` flag is set.
    #[arg(long)]
    pub active_only: bool,

    /// Maximum number of rows to print.
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}

/// Execute the show command.
///
/// # Errors
///
/// Returns an error if the table does not exist or cannot be read.
pub async fn execute(args: &ShowArgs, config: &Config) -> Result<()> {
    let backend = open_backend(config)?;
    let registry = warehouse_registry();
    let (_, store) = resolve_table(&backend, &registry, &args.table)?;
    let snapshot = store
        .snapshot()
        .await
        .with_context(|| format!("Failed to read {}", args.table))?;

    let mut batches = snapshot.batches;
    if args.active_only {
        batches = batches
            .iter()
            .map(only_active)
            .collect::<Result<Vec<_>>>()?;
    }
    let total: usize = batches.iter().map(RecordBatch::num_rows).sum();
    let batches = truncate(&batches, args.limit);

    match config.format {
        OutputFormat::Json => {
            let mut writer = arrow_json::ArrayWriter::new(Vec::new());
            let refs: Vec<&RecordBatch> = batches.iter().collect();
            writer.write_batches(&refs)?;
            writer.finish()?;
            println!("{}", String::from_utf8(writer.into_inner())?);
        }
        OutputFormat::Text => {
            println!(
                "{} {} (version {}, {} rows)",
                "Table".bold(),
                args.table.cyan(),
                snapshot.version,
                total
            );
            println!("{}", pretty_format_batches(&batches)?);
            if total > args.limit {
                println!("{}", format!("... {} more rows", total - args.limit).dimmed());
            }
        }
    }
    Ok(())
}

fn only_active(batch: &RecordBatch) -> Result<RecordBatch> {
    let Some(column) = batch.column_by_name(columns::IS_ACTIVE) else {
        bail!("table has no {} column", columns::IS_ACTIVE);
    };
    let Some(flags) = column.as_any().downcast_ref::<BooleanArray>() else {
        bail!("{} is not a boolean column", columns::IS_ACTIVE);
    };
    // Null flags are treated as inactive.
    let mask: BooleanArray = flags.iter().map(|flag| Some(flag == Some(true))).collect();
    Ok(filter_record_batch(batch, &mask)?)
}

fn truncate(batches: &[RecordBatch], limit: usize) -> Vec<RecordBatch> {
    let mut remaining = limit;
    let mut kept = Vec::new();
    for batch in batches {
        if remaining == 0 {
            break;
        }
        let take = batch.num_rows().min(remaining);
        kept.push(batch.slice(0, take));
        remaining -= take;
    }
    kept
}
