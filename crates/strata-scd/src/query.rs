//! Analytical SQL over lake tables, backed by `DataFusion`.
//!
//! Every query runs in a fresh session holding the latest snapshot of each
//! configured table, registered as `{schema}.{table}`. Only single read-only
//! statements are accepted.

use std::sync::Arc;
use std::time::Duration;

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::datasource::MemTable;
use datafusion::error::DataFusionError;
use datafusion::prelude::SessionContext;
use datafusion::sql::TableReference;
use datafusion::sql::parser::{DFParser, Statement as DFStatement};
use datafusion::sql::sqlparser::ast::Statement as SqlStatement;
use tokio::time::timeout;

use strata_core::{SchemaRegistry, StorageBackend, TableStore};

use crate::error::{Result, ScdError};

const DEFAULT_SCHEMA: &str = "bmd";
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Where and how analytical queries run.
///
/// Passed explicitly to the engine; nothing is read from the process
/// environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseConfig {
    /// SQL schema the tables are registered under.
    pub schema: String,
    /// Logical table names to expose, resolved through the registry.
    pub tables: Vec<String>,
    /// Upper bound on a single query's execution time.
    pub query_timeout: Duration,
}

impl WarehouseConfig {
    /// Creates a config exposing `tables` under the default schema.
    #[must_use]
    pub fn new<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            tables: tables.into_iter().map(Into::into).collect(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Sets the SQL schema name.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Sets the query timeout.
    #[must_use]
    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }
}

/// Runs read-only SQL and returns the materialized result.
#[async_trait]
pub trait AnalyticsEngine: Send + Sync {
    /// Executes `sql`.
    ///
    /// # Errors
    ///
    /// Returns [`ScdError::Query`] if the query is rejected, fails, or times
    /// out, and [`ScdError::Setup`] if a configured table is missing.
    async fn query(&self, sql: &str) -> Result<Vec<RecordBatch>>;
}

/// [`AnalyticsEngine`] over versioned lake tables.
pub struct DataFusionEngine {
    backend: Arc<dyn StorageBackend>,
    registry: Arc<dyn SchemaRegistry>,
    config: WarehouseConfig,
}

impl std::fmt::Debug for DataFusionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFusionEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DataFusionEngine {
    /// Creates an engine reading tables from `backend`.
    #[must_use]
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        registry: Arc<dyn SchemaRegistry>,
        config: WarehouseConfig,
    ) -> Self {
        Self {
            backend,
            registry,
            config,
        }
    }

    async fn session(&self) -> Result<SessionContext> {
        let session = SessionContext::new();
        ensure_schema(&session, &self.config.schema).await?;

        for name in &self.config.tables {
            let metadata = self
                .registry
                .lookup(name)
                .map_err(|e| ScdError::setup(format!("unknown table '{name}': {e}")))?;
            let store = TableStore::new(Arc::clone(&self.backend), &metadata.location);
            if !store.exists().await? {
                return Err(ScdError::setup(format!(
                    "table '{name}' not found at {}",
                    metadata.location
                )));
            }
            let snapshot = store.snapshot().await?;
            let rows = snapshot.num_rows();
            let table = MemTable::try_new(snapshot.schema, vec![snapshot.batches])
                .map_err(|e| map_datafusion_error(&e))?;
            session
                .register_table(
                    TableReference::partial(self.config.schema.as_str(), name.as_str()),
                    Arc::new(table),
                )
                .map_err(|e| map_datafusion_error(&e))?;
            tracing::debug!(
                table = %name,
                version = snapshot.version,
                rows,
                "registered lake table"
            );
        }
        Ok(session)
    }
}

#[async_trait]
impl AnalyticsEngine for DataFusionEngine {
    async fn query(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        validate_query(sql)?;
        let session = self.session().await?;

        tracing::info!(
            schema = %self.config.schema,
            query_len = sql.len(),
            "executing query"
        );
        let df = session
            .sql(sql)
            .await
            .map_err(|e| map_datafusion_error(&e))?;
        timeout(self.config.query_timeout, df.collect())
            .await
            .map_err(|_| {
                ScdError::query(format!(
                    "query timed out after {:?}",
                    self.config.query_timeout
                ))
            })?
            .map_err(|e| map_datafusion_error(&e))
    }
}

fn validate_query(sql: &str) -> Result<()> {
    let statements = DFParser::parse_sql(sql)
        .map_err(|err| ScdError::query(format!("failed to parse SQL: {err}")))?;
    let mut iter = statements.iter();
    let Some(statement) = iter.next() else {
        return Err(ScdError::query("sql must contain a statement"));
    };
    if iter.next().is_some() {
        return Err(ScdError::query("only single-statement queries are supported"));
    }
    match statement {
        DFStatement::Statement(statement) => match statement.as_ref() {
            SqlStatement::Query(_) => Ok(()),
            _ => Err(ScdError::query("only SELECT/CTE queries are supported")),
        },
        _ => Err(ScdError::query("only SELECT/CTE queries are supported")),
    }
}

async fn ensure_schema(session: &SessionContext, schema: &str) -> Result<()> {
    let statement = format!("CREATE SCHEMA IF NOT EXISTS {schema}");
    let df = session
        .sql(&statement)
        .await
        .map_err(|err| map_datafusion_error(&err))?;
    df.collect()
        .await
        .map_err(|err| map_datafusion_error(&err))?;
    Ok(())
}

fn map_datafusion_error(err: &DataFusionError) -> ScdError {
    match err {
        DataFusionError::SQL(_, _)
        | DataFusionError::Plan(_)
        | DataFusionError::SchemaError(_, _) => ScdError::query(format!("invalid query: {err}")),
        _ => ScdError::query(format!("query failed: {err}")),
    }
}
