use std::sync::Arc;

use serde::Serialize;
use strata_core::{
    CatalogRefresher, LoggingRefresher, SchemaRegistry, StorageBackend, cast_batches, job_span,
    refresh_catalog,
};
use tracing::Instrument as _;

use super::resolve_table;
use crate::error::Result;
use crate::query::AnalyticsEngine;
use crate::schemas::{DIM_CUSTOMERS_SCD, FUTURE_ORDERS, FUTURE_ORDERS_CRAWLER, ORDERS};

/// Result of one extract run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractOutcome {
    /// Rows in the rewritten extract.
    pub rows: usize,
    /// Table version holding them.
    pub version: u64,
}

/// SQL selecting upcoming orders of active customers.
///
/// "Upcoming" is judged by the engine's clock at execution time.
#[must_use]
pub fn future_orders_sql(schema: &str) -> String {
    format!(
        "WITH upcoming_orders AS (
    SELECT *
    FROM {schema}.{ORDERS}
    WHERE pickup_date > CAST(current_date() AS TIMESTAMP)
), active_customers AS (
    SELECT *
    FROM {schema}.{DIM_CUSTOMERS_SCD}
    WHERE is_active = true
)
SELECT
    o.order_name AS order_name,
    c.first_name AS first_name,
    o.financial_status AS financial_status,
    o.draft_type AS draft_type,
    o.theme AS theme,
    o.flavor AS flavor,
    o.allergies AS allergies,
    o.pickup_date AS pickup_date
FROM active_customers c
JOIN upcoming_orders o ON c.customer_id = o.customer_id
ORDER BY o.pickup_date"
    )
}

/// Rebuilds the future orders extract by full overwrite.
pub struct FutureOrdersJob {
    backend: Arc<dyn StorageBackend>,
    registry: Arc<dyn SchemaRegistry>,
    engine: Arc<dyn AnalyticsEngine>,
    refresher: Arc<dyn CatalogRefresher>,
    schema: String,
    crawler: String,
}

impl std::fmt::Debug for FutureOrdersJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FutureOrdersJob")
            .field("schema", &self.schema)
            .field("crawler", &self.crawler)
            .finish_non_exhaustive()
    }
}

impl FutureOrdersJob {
    /// Creates the job. `schema` is the SQL schema the engine exposes the
    /// source tables under.
    #[must_use]
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        registry: Arc<dyn SchemaRegistry>,
        engine: Arc<dyn AnalyticsEngine>,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            registry,
            engine,
            refresher: Arc::new(LoggingRefresher),
            schema: schema.into(),
            crawler: FUTURE_ORDERS_CRAWLER.to_string(),
        }
    }

    /// Sets the catalog refresher notified after the overwrite.
    #[must_use]
    pub fn with_refresher(mut self, refresher: Arc<dyn CatalogRefresher>) -> Self {
        self.refresher = refresher;
        self
    }

    /// Runs the query and replaces the extract with its result.
    ///
    /// The query completes before the target is touched, so a failed query
    /// leaves the previous extract in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails, the result does not fit the
    /// extract schema, or the overwrite loses a race with another writer.
    pub async fn run(&self) -> Result<ExtractOutcome> {
        let span = job_span("future_orders", FUTURE_ORDERS);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> Result<ExtractOutcome> {
        let (metadata, store) = resolve_table(&self.backend, self.registry.as_ref(), FUTURE_ORDERS)?;

        let batches = self.engine.query(&future_orders_sql(&self.schema)).await?;
        let batches = cast_batches(&batches, &metadata.schema)?;
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();

        let version = store.overwrite(&metadata.schema, &batches).await?;
        tracing::info!(rows, version, "rewrote future orders extract");

        refresh_catalog(self.refresher.as_ref(), &self.crawler).await;
        Ok(ExtractOutcome { rows, version })
    }
}
