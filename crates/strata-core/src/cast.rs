//! Schema casting for extracted tabular data.
//!
//! Extracted records arrive loosely typed (ids as `Int64`, timestamps as
//! strings). Before they are compared against or written into a table they
//! are projected onto the table's registered schema. Casting is strict: a
//! value that cannot be represented in the target type fails the whole batch
//! rather than being silently nulled.

use std::sync::Arc;

use arrow::array::{ArrayRef, new_null_array};
use arrow::compute::{CastOptions, cast_with_options};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::error::{Error, Result};

/// Casts `batch` onto `schema`.
///
/// Columns are matched by name and emitted in schema order; extra source
/// columns are dropped. A nullable target column missing from the source is
/// filled with nulls. A missing non-nullable column, a value that fails to
/// cast, or a null in a non-nullable column is a [`Error::SchemaCast`].
///
/// # Errors
///
/// Returns [`Error::SchemaCast`] when the batch cannot be represented in
/// `schema`.
pub fn cast_to_schema(batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch> {
    let options = CastOptions {
        safe: false,
        ..CastOptions::default()
    };
    let source_schema = batch.schema();

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let column = match source_schema.column_with_name(field.name()) {
            Some((idx, source_field)) => {
                let source = batch.column(idx);
                if source_field.data_type() == field.data_type() {
                    Arc::clone(source)
                } else {
                    cast_with_options(source, field.data_type(), &options).map_err(|e| {
                        Error::schema_cast(format!(
                            "column '{}' cannot be cast from {} to {}: {e}",
                            field.name(),
                            source_field.data_type(),
                            field.data_type()
                        ))
                    })?
                }
            }
            None if field.is_nullable() => new_null_array(field.data_type(), batch.num_rows()),
            None => {
                return Err(Error::schema_cast(format!(
                    "missing required column '{}'",
                    field.name()
                )));
            }
        };

        if !field.is_nullable() && column.null_count() > 0 {
            return Err(Error::schema_cast(format!(
                "column '{}' is not nullable but contains {} null value(s)",
                field.name(),
                column.null_count()
            )));
        }
        columns.push(column);
    }

    RecordBatch::try_new(Arc::clone(schema), columns)
        .map_err(|e| Error::schema_cast(format!("record batch build failed: {e}")))
}

/// Casts every batch onto `schema`, failing on the first mismatch.
///
/// # Errors
///
/// Returns [`Error::SchemaCast`] if any batch cannot be cast.
pub fn cast_batches(batches: &[RecordBatch], schema: &SchemaRef) -> Result<Vec<RecordBatch>> {
    batches
        .iter()
        .map(|batch| cast_to_schema(batch, schema))
        .collect()
}

#[cfg(test)]
mod tests {
    use arrow::array::{
        Array as _, Int32Array, Int64Array, StringArray, TimestampMicrosecondArray,
    };
    use arrow::datatypes::{DataType, Field, Schema, TimeUnit};

    use super::*;

    fn target() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("customer_id", DataType::Int64, false),
            Field::new("number_of_orders", DataType::Int32, true),
            Field::new(
                "updated_at",
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                true,
            ),
            Field::new("is_active", DataType::Boolean, true),
        ]))
    }

    fn raw(orders: Vec<Option<i64>>, updated: Vec<Option<&str>>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("number_of_orders", DataType::Int64, true),
            Field::new("customer_id", DataType::Int64, true),
            Field::new("updated_at", DataType::Utf8, true),
            Field::new("ignored", DataType::Utf8, true),
        ]));
        let n = orders.len();
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(orders)),
                Arc::new(Int64Array::from((1..=n as i64).collect::<Vec<_>>())),
                Arc::new(StringArray::from(updated)),
                Arc::new(StringArray::from(vec![Some("x"); n])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn casts_reorders_and_fills_missing_nullable_columns() {
        let batch = raw(
            vec![Some(3), None],
            vec![Some("2024-05-01T10:00:00Z"), None],
        );
        let cast = cast_to_schema(&batch, &target()).expect("cast");

        assert_eq!(cast.schema().fields(), target().fields());
        let orders = cast
            .column(1)
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        assert_eq!(orders.value(0), 3);
        assert!(orders.is_null(1));

        let updated = cast
            .column(2)
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .unwrap();
        assert_eq!(updated.value(0), 1_714_557_600_000_000);
        assert_eq!(cast.column(3).null_count(), 2);
    }

    #[test]
    fn unparseable_value_fails_instead_of_nulling() {
        let batch = raw(vec![Some(1)], vec![Some("yesterday-ish")]);
        let err = cast_to_schema(&batch, &target()).unwrap_err();
        assert!(matches!(err, Error::SchemaCast { .. }), "{err}");
        assert!(err.to_string().contains("updated_at"));
    }

    #[test]
    fn overflowing_counter_fails() {
        let batch = raw(vec![Some(i64::MAX)], vec![None]);
        assert!(cast_to_schema(&batch, &target()).is_err());
    }

    #[test]
    fn missing_required_column_fails() {
        let schema = Arc::new(Schema::new(vec![Field::new("other", DataType::Utf8, true)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(vec!["a"]))]).unwrap();
        let err = cast_to_schema(&batch, &target()).unwrap_err();
        assert!(err.to_string().contains("customer_id"));
    }

    #[test]
    fn null_in_required_column_fails() {
        let schema = Arc::new(Schema::new(vec![Field::new(
            "customer_id",
            DataType::Int64,
            true,
        )]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![None, Some(1)]))])
                .unwrap();
        let err = cast_to_schema(&batch, &target()).unwrap_err();
        assert!(err.to_string().contains("not nullable"));
    }
}
