//! Extract command - rebuild the future orders extract.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use owo_colors::OwoColorize;
use strata_scd::schemas::{DIM_CUSTOMERS_SCD, ORDERS, warehouse_registry};
use strata_scd::{DataFusionEngine, FutureOrdersJob, WarehouseConfig};

use super::{catalog_refresher, open_backend, print_outcome};
use crate::Config;

/// Arguments for the extract command.
#[derive(Debug, Args)]
pub struct ExtractArgs {}

/// Execute the extract command.
///
/// # Errors
///
/// Returns an error if the query or the overwrite fails.
pub async fn execute(_args: &ExtractArgs, config: &Config) -> Result<()> {
    let backend = open_backend(config)?;
    let registry = Arc::new(warehouse_registry());
    let warehouse = WarehouseConfig::new([DIM_CUSTOMERS_SCD, ORDERS])
        .with_schema(config.warehouse_schema.clone())
        .with_query_timeout(config.query_timeout);
    let engine = DataFusionEngine::new(Arc::clone(&backend), registry.clone(), warehouse);

    let outcome = FutureOrdersJob::new(
        backend,
        registry,
        Arc::new(engine),
        config.warehouse_schema.clone(),
    )
    .with_refresher(catalog_refresher(config))
    .run()
    .await
    .context("Future orders extract failed")?;

    print_outcome(
        config,
        &format!(
            "{} future orders with {} rows (version {})",
            "Rebuilt".green(),
            outcome.rows,
            outcome.version
        ),
        &outcome,
    )
}
