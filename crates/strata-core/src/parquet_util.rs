//! Parquet encoding/decoding helpers for table snapshots.
//!
//! Every table version is a single Parquet object. The Arrow schema is embedded
//! by the writer, so timezone-aware timestamps and nullability survive a
//! round trip. Empty snapshots still carry their schema.

use std::io::Cursor;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;

use crate::error::{Error, Result};

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some("strata".to_string()),
    };
    WriterProperties::builder()
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Encodes `batches` as one Parquet object with the given schema.
///
/// # Errors
///
/// Returns an error if a batch does not match `schema` or the Parquet write
/// fails.
pub fn write_batches(schema: &SchemaRef, batches: &[RecordBatch]) -> Result<Bytes> {
    let mut cursor = Cursor::new(Vec::<u8>::new());
    let mut writer = ArrowWriter::try_new(&mut cursor, schema.clone(), Some(writer_properties()))
        .map_err(|e| Error::parquet(format!("parquet writer init failed: {e}")))?;
    for batch in batches {
        if batch.schema().fields() != schema.fields() {
            return Err(Error::schema_cast(format!(
                "batch schema {:?} does not match table schema {:?}",
                batch.schema().fields(),
                schema.fields()
            )));
        }
        writer
            .write(batch)
            .map_err(|e| Error::parquet(format!("parquet write failed: {e}")))?;
    }
    writer
        .close()
        .map_err(|e| Error::parquet(format!("parquet close failed: {e}")))?;
    Ok(Bytes::from(cursor.into_inner()))
}

/// Decodes a Parquet object into its schema and record batches.
///
/// # Errors
///
/// Returns an error if the bytes are not a readable Parquet file.
pub fn read_batches(bytes: Bytes) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)
        .map_err(|e| Error::parquet(format!("parquet reader init failed: {e}")))?;
    let schema = builder.schema().clone();
    let reader = builder
        .build()
        .map_err(|e| Error::parquet(format!("parquet reader build failed: {e}")))?;

    let mut batches = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| Error::parquet(format!("parquet read batch failed: {e}")))?;
        batches.push(batch);
    }
    Ok((schema, batches))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Int64Array, StringArray, TimestampMicrosecondArray};
    use arrow::datatypes::{DataType, Field, Schema, TimeUnit};

    use super::*;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
            Field::new(
                "updated_at",
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                true,
            ),
        ]))
    }

    #[test]
    fn empty_snapshot_keeps_schema() {
        let bytes = write_batches(&schema(), &[]).expect("write");
        let (read_schema, batches) = read_batches(bytes).expect("read");
        assert!(batches.is_empty());
        assert_eq!(read_schema.fields(), schema().fields());
    }

    #[test]
    fn timestamps_keep_timezone() {
        let schema = schema();
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec![Some("a"), None])),
                Arc::new(
                    TimestampMicrosecondArray::from(vec![Some(1_000_000), None])
                        .with_timezone("UTC"),
                ),
            ],
        )
        .expect("batch");

        let bytes = write_batches(&schema, &[batch.clone()]).expect("write");
        let (_, batches) = read_batches(bytes).expect("read");
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].columns(), batch.columns());
    }

    #[test]
    fn mismatched_batch_is_rejected() {
        let other = Arc::new(Schema::new(vec![Field::new("id", DataType::Utf8, false)]));
        let batch =
            RecordBatch::try_new(other, vec![Arc::new(StringArray::from(vec!["x"]))]).unwrap();
        let err = write_batches(&schema(), &[batch]).unwrap_err();
        assert!(matches!(err, Error::SchemaCast { .. }));
    }

    #[test]
    fn garbage_bytes_are_a_parquet_error() {
        let err = read_batches(Bytes::from_static(b"not parquet")).unwrap_err();
        assert!(matches!(err, Error::Parquet { .. }));
    }
}
