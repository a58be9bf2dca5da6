use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use arrow_json::ReaderBuilder;
use serde::Serialize;
use strata_core::{SchemaRegistry, StorageBackend, cast_batches};

use super::resolve_table;
use crate::error::{Result, ScdError};

/// Result of loading a file into a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadOutcome {
    /// Rows written.
    pub rows: usize,
    /// Table version holding them.
    pub version: u64,
}

/// Creates the registry table `name`, empty, with its registered schema.
///
/// # Errors
///
/// Returns [`ScdError::Setup`] for unknown tables and [`ScdError::Conflict`]
/// if the table already exists.
pub async fn create_table(
    backend: &Arc<dyn StorageBackend>,
    registry: &dyn SchemaRegistry,
    name: &str,
) -> Result<u64> {
    let (metadata, store) = resolve_table(backend, registry, name)?;
    Ok(store.create(&metadata.schema).await?)
}

/// Deletes every version of registry table `name`. Returns the number of
/// versions removed; a table that does not exist removes nothing.
///
/// # Errors
///
/// Returns [`ScdError::Setup`] for unknown tables, or a storage error if
/// listing or deleting fails.
pub async fn drop_table(
    backend: &Arc<dyn StorageBackend>,
    registry: &dyn SchemaRegistry,
    name: &str,
) -> Result<usize> {
    let (_, store) = resolve_table(backend, registry, name)?;
    Ok(store.drop_table().await?)
}

/// Replaces the content of registry table `name` with a JSON-lines file.
///
/// Each line is one row, decoded directly into the registered schema. The
/// table is created if it does not exist yet.
///
/// # Errors
///
/// Returns [`ScdError::Source`] if the file cannot be read and
/// [`ScdError::SchemaCast`] if a row does not fit the schema. Nothing is
/// written in either case.
pub async fn load_json_lines(
    backend: &Arc<dyn StorageBackend>,
    registry: &dyn SchemaRegistry,
    name: &str,
    path: &Path,
) -> Result<LoadOutcome> {
    let (metadata, store) = resolve_table(backend, registry, name)?;
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| ScdError::extract(format!("read {}: {e}", path.display())))?;

    let reader = ReaderBuilder::new(Arc::clone(&metadata.schema))
        .build(Cursor::new(content))
        .map_err(|e| ScdError::SchemaCast {
            message: format!("{}: {e}", path.display()),
        })?;
    let batches = reader
        .collect::<std::result::Result<Vec<RecordBatch>, _>>()
        .map_err(|e| ScdError::SchemaCast {
            message: format!("{}: {e}", path.display()),
        })?;
    let batches = cast_batches(&batches, &metadata.schema)?;
    let rows: usize = batches.iter().map(RecordBatch::num_rows).sum();

    let version = store.overwrite(&metadata.schema, &batches).await?;
    tracing::info!(table = name, rows, version, path = %path.display(), "loaded table");
    Ok(LoadOutcome { rows, version })
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use strata_core::MemoryBackend;

    use super::*;
    use crate::schemas::{ORDERS, warehouse_registry};

    fn backend() -> Arc<dyn StorageBackend> {
        Arc::new(MemoryBackend::new())
    }

    fn orders_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[tokio::test]
    async fn load_replaces_table_content() {
        let backend = backend();
        let registry = warehouse_registry();
        let file = orders_file(&[
            r##"{"order_id": 1, "order_name": "#1", "customer_id": 7, "pickup_date": "2024-06-01T10:00:00"}"##,
            r##"{"order_id": 2, "order_name": "#2", "customer_id": 8}"##,
        ]);

        let first = load_json_lines(&backend, &registry, ORDERS, file.path())
            .await
            .unwrap();
        assert_eq!(first, LoadOutcome { rows: 2, version: 0 });

        let again = load_json_lines(&backend, &registry, ORDERS, file.path())
            .await
            .unwrap();
        assert_eq!(again.version, 1);
    }

    #[tokio::test]
    async fn bad_row_writes_nothing() {
        let backend = backend();
        let registry = warehouse_registry();
        let file = orders_file(&[r#"{"order_id": "not a number"}"#]);

        let err = load_json_lines(&backend, &registry, ORDERS, file.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ScdError::SchemaCast { .. }), "{err}");
        assert!(backend.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_table_twice_conflicts() {
        let backend = backend();
        let registry = warehouse_registry();
        assert_eq!(create_table(&backend, &registry, ORDERS).await.unwrap(), 0);

        let err = create_table(&backend, &registry, ORDERS).await.unwrap_err();
        assert!(matches!(err, ScdError::Conflict { .. }));

        let err = create_table(&backend, &registry, "nope").await.unwrap_err();
        assert!(matches!(err, ScdError::Setup { .. }));
    }

    #[tokio::test]
    async fn drop_table_removes_every_version() {
        let backend = backend();
        let registry = warehouse_registry();
        let file = orders_file(&[r##"{"order_id": 1, "order_name": "#1", "customer_id": 7}"##]);
        create_table(&backend, &registry, ORDERS).await.unwrap();
        load_json_lines(&backend, &registry, ORDERS, file.path())
            .await
            .unwrap();

        assert_eq!(drop_table(&backend, &registry, ORDERS).await.unwrap(), 2);
        assert!(backend.list("").await.unwrap().is_empty());
        assert_eq!(drop_table(&backend, &registry, ORDERS).await.unwrap(), 0);

        // The name is free again.
        assert_eq!(create_table(&backend, &registry, ORDERS).await.unwrap(), 0);

        let err = drop_table(&backend, &registry, "nope").await.unwrap_err();
        assert!(matches!(err, ScdError::Setup { .. }));
    }
}
