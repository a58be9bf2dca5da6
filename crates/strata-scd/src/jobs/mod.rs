//! Batch jobs: one invocation runs one job to completion.
//!
//! - [`ReconcileJob`] merges changed customers into the SCD dimension.
//! - [`FutureOrdersJob`] rebuilds the future orders extract.
//! - [`load_json_lines`] and [`create_table`] seed lake tables.

mod future_orders;
mod load;
mod reconcile;

pub use future_orders::{ExtractOutcome, FutureOrdersJob, future_orders_sql};
pub use load::{LoadOutcome, create_table, drop_table, load_json_lines};
pub use reconcile::{ReconcileJob, ReconcileOutcome};

use std::sync::Arc;

use strata_core::{SchemaRegistry, StorageBackend, TableMetadata, TableStore};

use crate::error::{Result, ScdError};

/// Resolves a logical table through the registry.
///
/// # Errors
///
/// Returns [`ScdError::Setup`] for tables the registry does not know.
pub fn resolve_table(
    backend: &Arc<dyn StorageBackend>,
    registry: &dyn SchemaRegistry,
    name: &str,
) -> Result<(TableMetadata, TableStore)> {
    let metadata = registry
        .lookup(name)
        .map_err(|e| ScdError::setup(format!("registry lookup for '{name}' failed: {e}")))?;
    let store = TableStore::new(Arc::clone(backend), &metadata.location);
    Ok((metadata, store))
}
