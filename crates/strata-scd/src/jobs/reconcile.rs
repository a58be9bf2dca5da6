use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use strata_core::{
    CatalogRefresher, LoggingRefresher, SchemaRegistry, StorageBackend, cast_to_schema, job_span,
    refresh_catalog,
};
use tracing::Instrument as _;

use super::resolve_table;
use crate::codec::source_records;
use crate::dimension::DimensionTable;
use crate::error::{Result, ScdError};
use crate::merge::MergeStats;
use crate::reconcile::build_changeset;
use crate::schemas::{DIM_CUSTOMERS_CRAWLER, DIM_CUSTOMERS_SCD};
use crate::source::CustomerSource;

/// Result of one reconcile run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The source had nothing new, or nothing that changed a tracked
    /// attribute. The table was not written.
    NoChanges,
    /// The changeset was merged as one new table version.
    Merged(MergeStats),
}

/// Reconciles changed customers into the SCD Type-2 dimension.
pub struct ReconcileJob {
    backend: Arc<dyn StorageBackend>,
    registry: Arc<dyn SchemaRegistry>,
    source: Arc<dyn CustomerSource>,
    refresher: Arc<dyn CatalogRefresher>,
    table: String,
    crawler: String,
}

impl std::fmt::Debug for ReconcileJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileJob")
            .field("table", &self.table)
            .field("crawler", &self.crawler)
            .finish_non_exhaustive()
    }
}

impl ReconcileJob {
    /// Creates a job for the `dim_customers_scd` table.
    #[must_use]
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        registry: Arc<dyn SchemaRegistry>,
        source: Arc<dyn CustomerSource>,
    ) -> Self {
        Self {
            backend,
            registry,
            source,
            refresher: Arc::new(LoggingRefresher),
            table: DIM_CUSTOMERS_SCD.to_string(),
            crawler: DIM_CUSTOMERS_CRAWLER.to_string(),
        }
    }

    /// Sets the catalog refresher notified after a merge.
    #[must_use]
    pub fn with_refresher(mut self, refresher: Arc<dyn CatalogRefresher>) -> Self {
        self.refresher = refresher;
        self
    }

    /// Targets a different registry table.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Runs the job for customers changed in `[start, end]`.
    ///
    /// New versions open and superseded versions close on `run_date`.
    ///
    /// # Errors
    ///
    /// - [`ScdError::Setup`] if the table is unknown or not created.
    /// - [`ScdError::SchemaCast`] if the extract does not fit the schema.
    /// - [`ScdError::Conflict`] if another writer committed during the run.
    ///
    /// On any error the table is left as it was.
    pub async fn run(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        run_date: NaiveDate,
    ) -> Result<ReconcileOutcome> {
        let span = job_span("reconcile", &self.table);
        self.run_inner(start, end, run_date).instrument(span).await
    }

    async fn run_inner(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        run_date: NaiveDate,
    ) -> Result<ReconcileOutcome> {
        if start > end {
            return Err(ScdError::invalid_input(format!(
                "start date {start} is after end date {end}"
            )));
        }
        let (metadata, store) = resolve_table(&self.backend, self.registry.as_ref(), &self.table)?;
        let dimension = DimensionTable::new(store, &metadata);
        dimension.ensure_exists().await?;

        let fetched = self.source.fetch(start, end).await?;
        let Some(batch) = fetched.filter(|batch| batch.num_rows() > 0) else {
            tracing::info!(%start, %end, "no changed customers; nothing to write");
            return Ok(ReconcileOutcome::NoChanges);
        };
        let records = source_records(&cast_to_schema(&batch, &metadata.schema)?)?;
        tracing::info!(records = records.len(), %run_date, "fetched changed customers");

        let active = dimension.read_active().await?;
        let changeset = build_changeset(records, &active.rows, run_date)?;
        if changeset.is_empty() {
            tracing::info!(
                version = active.version,
                "no tracked attribute changed; nothing to write"
            );
            return Ok(ReconcileOutcome::NoChanges);
        }

        let stats = dimension.merge(active.version, &changeset).await?;
        refresh_catalog(self.refresher.as_ref(), &self.crawler).await;
        Ok(ReconcileOutcome::Merged(stats))
    }
}
