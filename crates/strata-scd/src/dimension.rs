//! The customer dimension as a versioned lake table.

use arrow::datatypes::SchemaRef;
use strata_core::{TableMetadata, TableStore};

use crate::codec::{dimension_rows, rows_to_batch};
use crate::error::{Result, ScdError};
use crate::merge::{MergeStats, merge_rows};
use crate::model::{Changeset, DimensionRow};

/// Active rows together with the table version they were read from.
#[derive(Debug, Clone)]
pub struct ActiveSnapshot {
    /// Table version the rows were read from.
    pub version: u64,
    /// Rows with `is_active = true`.
    pub rows: Vec<DimensionRow>,
}

/// Read and merge access to the dimension table.
#[derive(Debug, Clone)]
pub struct DimensionTable {
    store: TableStore,
    schema: SchemaRef,
}

impl DimensionTable {
    /// Creates a handle from registry metadata.
    #[must_use]
    pub fn new(store: TableStore, metadata: &TableMetadata) -> Self {
        Self {
            store,
            schema: metadata.schema.clone(),
        }
    }

    /// Fails with a setup error unless the table has been created.
    ///
    /// # Errors
    ///
    /// Returns [`ScdError::Setup`] if the table does not exist.
    pub async fn ensure_exists(&self) -> Result<()> {
        if self.store.exists().await? {
            Ok(())
        } else {
            Err(ScdError::setup(format!(
                "dimension table not found at {}",
                self.store.location()
            )))
        }
    }

    /// Reads every version of every key.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be read or decoded.
    pub async fn read_all(&self) -> Result<(u64, Vec<DimensionRow>)> {
        let snapshot = self.store.snapshot().await?;
        Ok((snapshot.version, dimension_rows(&snapshot.batches)?))
    }

    /// Reads the active version of every key.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be read or decoded.
    pub async fn read_active(&self) -> Result<ActiveSnapshot> {
        let (version, rows) = self.read_all().await?;
        Ok(ActiveSnapshot {
            version,
            rows: rows.into_iter().filter(|row| row.is_active).collect(),
        })
    }

    /// Merges `changeset` into the table and commits the result as one new
    /// version.
    ///
    /// `read_version` is the version the changeset was computed from. If the
    /// table has moved on since, nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`ScdError::Conflict`] if another writer committed after
    /// `read_version`, or [`ScdError::Invariant`] if the merge matches
    /// ambiguously.
    pub async fn merge(&self, read_version: u64, changeset: &Changeset) -> Result<MergeStats> {
        let snapshot = self.store.snapshot().await?;
        if snapshot.version != read_version {
            return Err(ScdError::Conflict {
                message: format!(
                    "{} moved from version {read_version} to {} during the run",
                    self.store.location(),
                    snapshot.version
                ),
            });
        }

        let mut rows = dimension_rows(&snapshot.batches)?;
        let stats = merge_rows(&mut rows, changeset)?;

        let batch = strata_core::cast_to_schema(&rows_to_batch(&rows)?, &snapshot.schema)?;
        let version = self
            .store
            .commit(read_version, &snapshot.schema, &[batch])
            .await?;
        tracing::info!(
            location = %self.store.location(),
            version,
            updated = stats.updated,
            inserted = stats.inserted,
            "merged changeset"
        );
        Ok(stats)
    }

    /// Creates the table empty with its registered schema.
    ///
    /// # Errors
    ///
    /// Returns [`ScdError::Conflict`] if the table already exists.
    pub async fn create(&self) -> Result<u64> {
        Ok(self.store.create(&self.schema).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use strata_core::{MemoryBackend, SchemaRegistry as _};

    use super::*;
    use crate::model::{CustomerAttributes, SourceRecord};
    use crate::reconcile::build_changeset;
    use crate::schemas::{DIM_CUSTOMERS_SCD, warehouse_registry};

    fn table() -> DimensionTable {
        let metadata = warehouse_registry().lookup(DIM_CUSTOMERS_SCD).unwrap();
        let store = TableStore::new(Arc::new(MemoryBackend::new()), &metadata.location);
        DimensionTable::new(store, &metadata)
    }

    fn record(id: i64, orders: i32) -> SourceRecord {
        SourceRecord {
            attributes: CustomerAttributes {
                customer_id: id,
                first_name: None,
                last_name: None,
                email: None,
                phone: None,
                number_of_orders: Some(orders),
            },
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn missing_table_is_a_setup_error() {
        let err = table().ensure_exists().await.unwrap_err();
        assert!(matches!(err, ScdError::Setup { .. }));
    }

    #[tokio::test]
    async fn merge_commits_one_version() {
        let table = table();
        table.create().await.unwrap();
        table.ensure_exists().await.unwrap();

        let run = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let active = table.read_active().await.unwrap();
        let changeset = build_changeset(vec![record(1, 1)], &active.rows, run).unwrap();
        let stats = table.merge(active.version, &changeset).await.unwrap();
        assert_eq!(stats.inserted, 1);

        let active = table.read_active().await.unwrap();
        assert_eq!(active.version, 1);
        assert_eq!(active.rows.len(), 1);
    }

    #[tokio::test]
    async fn merge_from_stale_read_conflicts() {
        let table = table();
        table.create().await.unwrap();
        let run = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let stale = table.read_active().await.unwrap();

        let first = build_changeset(vec![record(1, 1)], &stale.rows, run).unwrap();
        table.merge(stale.version, &first).await.unwrap();

        let second = build_changeset(vec![record(2, 1)], &stale.rows, run).unwrap();
        let err = table.merge(stale.version, &second).await.unwrap_err();
        assert!(matches!(err, ScdError::Conflict { .. }));

        let (_, rows) = table.read_all().await.unwrap();
        assert_eq!(rows.len(), 1);
    }
}
