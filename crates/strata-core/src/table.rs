//! Versioned lake tables on object storage.
//!
//! A table is a directory of immutable Parquet snapshots:
//!
//! ```text
//! {location}/_versions/00000000000000000000.parquet   <- created (empty)
//! {location}/_versions/00000000000000000001.parquet   <- first commit
//! ...
//! ```
//!
//! The highest version is the current state. A commit writes version `n + 1`
//! with a `DoesNotExist` precondition, so publishing a new state is a single
//! atomic object creation: readers observe either the previous snapshot or the
//! next one, never a partially applied write. A writer that loses the race
//! gets [`Error::Conflict`] and nothing it computed becomes visible.

use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::error::{Error, Result};
use crate::parquet_util::{read_batches, write_batches};
use crate::storage::{StorageBackend, WritePrecondition, WriteResult};

const VERSIONS_DIR: &str = "_versions";
const SNAPSHOT_SUFFIX: &str = ".parquet";

/// A fully materialized table version.
#[derive(Debug, Clone)]
pub struct TableSnapshot {
    /// Version this snapshot was read from.
    pub version: u64,
    /// Table schema as stored.
    pub schema: SchemaRef,
    /// Table content.
    pub batches: Vec<RecordBatch>,
}

impl TableSnapshot {
    /// Total number of rows across all batches.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

/// Handle to one versioned table at a storage location.
#[derive(Clone)]
pub struct TableStore {
    backend: Arc<dyn StorageBackend>,
    location: String,
}

impl std::fmt::Debug for TableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableStore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl TableStore {
    /// Creates a handle for the table at `location` (relative to the backend root).
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, location: impl Into<String>) -> Self {
        let location = location.into();
        Self {
            backend,
            location: location.trim_end_matches('/').to_string(),
        }
    }

    /// Returns the table location.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    fn versions_prefix(&self) -> String {
        format!("{}/{VERSIONS_DIR}/", self.location)
    }

    fn version_path(&self, version: u64) -> String {
        format!("{}{version:020}{SNAPSHOT_SUFFIX}", self.versions_prefix())
    }

    /// Returns every committed version in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend listing fails.
    pub async fn versions(&self) -> Result<Vec<u64>> {
        let prefix = self.versions_prefix();
        let mut versions: Vec<u64> = self
            .backend
            .list(&prefix)
            .await?
            .iter()
            .filter_map(|meta| {
                meta.path
                    .strip_prefix(&prefix)?
                    .strip_suffix(SNAPSHOT_SUFFIX)?
                    .parse()
                    .ok()
            })
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }

    /// Returns the current version, or `None` if the table does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend listing fails.
    pub async fn latest_version(&self) -> Result<Option<u64>> {
        Ok(self.versions().await?.last().copied())
    }

    /// Returns true if the table has been created.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend listing fails.
    pub async fn exists(&self) -> Result<bool> {
        Ok(self.latest_version().await?.is_some())
    }

    /// Creates an empty table with `schema` as version 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if the table already exists.
    pub async fn create(&self, schema: &SchemaRef) -> Result<u64> {
        if self.exists().await? {
            return Err(Error::conflict(format!(
                "table already exists at {}",
                self.location
            )));
        }
        self.write_version(0, schema, &[]).await?;
        tracing::info!(location = %self.location, "created table");
        Ok(0)
    }

    /// Deletes every version of the table. Returns the number of versions removed.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or deleting fails.
    pub async fn drop_table(&self) -> Result<usize> {
        let versions = self.versions().await?;
        for version in &versions {
            self.backend.delete(&self.version_path(*version)).await?;
        }
        tracing::info!(location = %self.location, versions = versions.len(), "dropped table");
        Ok(versions.len())
    }

    /// Reads the current table version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceNotFound`] if the table does not exist, or an
    /// error if the snapshot cannot be read or decoded.
    pub async fn snapshot(&self) -> Result<TableSnapshot> {
        let version = self
            .latest_version()
            .await?
            .ok_or_else(|| Error::resource_not_found("table", &self.location))?;
        let bytes = self.backend.get(&self.version_path(version)).await?;
        let (schema, batches) = read_batches(bytes)?;
        Ok(TableSnapshot {
            version,
            schema,
            batches,
        })
    }

    /// Publishes `batches` as the version after `read_version`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if another writer already published a
    /// version after `read_version`.
    pub async fn commit(
        &self,
        read_version: u64,
        schema: &SchemaRef,
        batches: &[RecordBatch],
    ) -> Result<u64> {
        let version = read_version
            .checked_add(1)
            .ok_or_else(|| Error::Internal {
                message: "table version overflow".into(),
            })?;
        self.write_version(version, schema, batches).await?;
        let rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
        tracing::debug!(location = %self.location, version, rows, "committed table version");
        Ok(version)
    }

    /// Replaces the table content with `batches`.
    ///
    /// A missing table is created by the overwrite itself, at version 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if a concurrent writer published first.
    pub async fn overwrite(&self, schema: &SchemaRef, batches: &[RecordBatch]) -> Result<u64> {
        match self.latest_version().await? {
            Some(current) => self.commit(current, schema, batches).await,
            None => {
                self.write_version(0, schema, batches).await?;
                tracing::info!(location = %self.location, "created table by overwrite");
                Ok(0)
            }
        }
    }

    async fn write_version(
        &self,
        version: u64,
        schema: &SchemaRef,
        batches: &[RecordBatch],
    ) -> Result<()> {
        let payload = write_batches(schema, batches)?;
        let path = self.version_path(version);
        match self
            .backend
            .put(&path, payload, WritePrecondition::DoesNotExist)
            .await?
        {
            WriteResult::Success { .. } => Ok(()),
            WriteResult::PreconditionFailed { .. } => Err(Error::conflict(format!(
                "version {version} of {} was published by another writer",
                self.location
            ))),
        }
    }
}
