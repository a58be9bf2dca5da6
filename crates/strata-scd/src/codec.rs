//! Conversion between customer dimension rows and Arrow record batches.
//!
//! Batches are cast onto [`dim_customers_scd_schema`] before decoding, so a
//! table stored with a compatible but not identical schema still decodes.

use std::sync::Arc;

use arrow::array::{
    Array as _, ArrayRef, BooleanArray, Date32Array, Int32Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::Date32Type;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use strata_core::cast_to_schema;

use crate::error::{Result, ScdError};
use crate::model::{CustomerAttributes, DimensionRow, SourceRecord};
use crate::schemas::{columns, dim_customers_scd_schema};

struct CustomerColumns<'a> {
    customer_id: &'a Int64Array,
    first_name: &'a StringArray,
    last_name: &'a StringArray,
    email: &'a StringArray,
    phone: &'a StringArray,
    number_of_orders: &'a Int32Array,
    updated_at: &'a TimestampMicrosecondArray,
}

impl<'a> CustomerColumns<'a> {
    fn new(batch: &'a RecordBatch) -> Result<Self> {
        Ok(Self {
            customer_id: column(batch, columns::CUSTOMER_ID)?,
            first_name: column(batch, columns::FIRST_NAME)?,
            last_name: column(batch, columns::LAST_NAME)?,
            email: column(batch, columns::EMAIL)?,
            phone: column(batch, columns::PHONE)?,
            number_of_orders: column(batch, columns::NUMBER_OF_ORDERS)?,
            updated_at: column(batch, columns::UPDATED_AT)?,
        })
    }

    fn attributes(&self, row: usize) -> CustomerAttributes {
        CustomerAttributes {
            customer_id: self.customer_id.value(row),
            first_name: string_at(self.first_name, row),
            last_name: string_at(self.last_name, row),
            email: string_at(self.email, row),
            phone: string_at(self.phone, row),
            number_of_orders: (!self.number_of_orders.is_null(row))
                .then(|| self.number_of_orders.value(row)),
        }
    }

    fn updated_at(&self, row: usize) -> Option<DateTime<Utc>> {
        if self.updated_at.is_null(row) {
            return None;
        }
        DateTime::from_timestamp_micros(self.updated_at.value(row))
    }
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| ScdError::SchemaCast {
            message: format!("missing column '{name}'"),
        })?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ScdError::SchemaCast {
            message: format!("column '{name}' has unexpected type"),
        })
}

fn string_at(array: &StringArray, row: usize) -> Option<String> {
    (!array.is_null(row)).then(|| array.value(row).to_string())
}

fn string_column<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
    Arc::new(values.collect::<StringArray>())
}

/// Decodes extracted records.
///
/// # Errors
///
/// Returns [`ScdError::SchemaCast`] if the batch does not fit the dimension's
/// attribute columns.
pub fn source_records(batch: &RecordBatch) -> Result<Vec<SourceRecord>> {
    let batch = cast_to_schema(batch, &dim_customers_scd_schema())?;
    let cols = CustomerColumns::new(&batch)?;
    Ok((0..batch.num_rows())
        .map(|row| SourceRecord {
            attributes: cols.attributes(row),
            updated_at: cols.updated_at(row),
        })
        .collect())
}

/// Decodes stored dimension rows.
///
/// # Errors
///
/// Returns [`ScdError::SchemaCast`] for incompatible batches and
/// [`ScdError::Invariant`] for rows missing their validity bookkeeping.
pub fn dimension_rows(batches: &[RecordBatch]) -> Result<Vec<DimensionRow>> {
    let schema = dim_customers_scd_schema();
    let mut rows = Vec::new();
    for batch in batches {
        let batch = cast_to_schema(batch, &schema)?;
        let cols = CustomerColumns::new(&batch)?;
        let start: &Date32Array = column(&batch, columns::EFFECTIVE_START_DATE)?;
        let end: &Date32Array = column(&batch, columns::EFFECTIVE_END_DATE)?;
        let active: &BooleanArray = column(&batch, columns::IS_ACTIVE)?;

        for row in 0..batch.num_rows() {
            let attributes = cols.attributes(row);
            if start.is_null(row) || end.is_null(row) || active.is_null(row) {
                return Err(ScdError::invariant(format!(
                    "customer {} has a version with null bookkeeping columns",
                    attributes.customer_id
                )));
            }
            let (Some(effective_start_date), Some(effective_end_date)) =
                (start.value_as_date(row), end.value_as_date(row))
            else {
                return Err(ScdError::invariant(format!(
                    "customer {} has a validity interval outside the calendar",
                    attributes.customer_id
                )));
            };
            rows.push(DimensionRow {
                source_updated_at: cols.updated_at(row),
                attributes,
                effective_start_date,
                effective_end_date,
                is_active: active.value(row),
            });
        }
    }
    Ok(rows)
}

/// Encodes dimension rows as one batch in the dimension schema.
///
/// # Errors
///
/// Returns an error if the batch cannot be assembled.
pub fn rows_to_batch<'a, I>(rows: I) -> Result<RecordBatch>
where
    I: IntoIterator<Item = &'a DimensionRow>,
{
    let rows: Vec<&DimensionRow> = rows.into_iter().collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(
            rows.iter().map(|r| r.customer_id()).collect::<Vec<_>>(),
        )),
        string_column(rows.iter().map(|r| r.attributes.first_name.as_deref())),
        string_column(rows.iter().map(|r| r.attributes.last_name.as_deref())),
        string_column(rows.iter().map(|r| r.attributes.email.as_deref())),
        string_column(rows.iter().map(|r| r.attributes.phone.as_deref())),
        Arc::new(Int32Array::from(
            rows.iter()
                .map(|r| r.attributes.number_of_orders)
                .collect::<Vec<_>>(),
        )),
        Arc::new(
            TimestampMicrosecondArray::from(
                rows.iter()
                    .map(|r| r.source_updated_at.map(|t| t.timestamp_micros()))
                    .collect::<Vec<_>>(),
            )
            .with_timezone("UTC"),
        ),
        Arc::new(Date32Array::from(
            rows.iter()
                .map(|r| Date32Type::from_naive_date(r.effective_start_date))
                .collect::<Vec<_>>(),
        )),
        Arc::new(Date32Array::from(
            rows.iter()
                .map(|r| Date32Type::from_naive_date(r.effective_end_date))
                .collect::<Vec<_>>(),
        )),
        Arc::new(BooleanArray::from(
            rows.iter().map(|r| r.is_active).collect::<Vec<_>>(),
        )),
    ];

    RecordBatch::try_new(dim_customers_scd_schema(), columns).map_err(|e| ScdError::SchemaCast {
        message: format!("record batch build failed: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use arrow::datatypes::{DataType, Field, Schema};
    use chrono::{NaiveDate, TimeZone as _};

    use super::*;
    use crate::model::sentinel_end_date;

    fn row(id: i64, orders: Option<i32>, active: bool) -> DimensionRow {
        DimensionRow {
            attributes: CustomerAttributes {
                customer_id: id,
                first_name: Some(format!("name-{id}")),
                last_name: None,
                email: Some(format!("{id}@example.com")),
                phone: None,
                number_of_orders: orders,
            },
            source_updated_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
            effective_start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            effective_end_date: if active {
                sentinel_end_date()
            } else {
                NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
            },
            is_active: active,
        }
    }

    #[test]
    fn rows_survive_encoding() {
        let rows = vec![row(1, Some(2), true), row(2, None, false)];
        let batch = rows_to_batch(&rows).expect("encode");
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(dimension_rows(&[batch]).expect("decode"), rows);
    }

    #[test]
    fn sentinel_date_encodes() {
        let batch = rows_to_batch(&[row(1, Some(1), true)]).unwrap();
        let decoded = dimension_rows(&[batch]).unwrap();
        assert_eq!(decoded[0].effective_end_date, sentinel_end_date());
    }

    #[test]
    fn source_records_ignore_bookkeeping_columns() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("customer_id", DataType::Int64, true),
            Field::new("first_name", DataType::Utf8, true),
            Field::new("number_of_orders", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![7])),
                Arc::new(StringArray::from(vec!["Bob"])),
                Arc::new(Int64Array::from(vec![1])),
            ],
        )
        .unwrap();

        let records = source_records(&batch).expect("decode");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].attributes.customer_id, 7);
        assert_eq!(records[0].attributes.first_name.as_deref(), Some("Bob"));
        assert_eq!(records[0].attributes.number_of_orders, Some(1));
        assert_eq!(records[0].updated_at, None);
    }

    #[test]
    fn stored_row_without_interval_is_an_invariant_violation() {
        let full = rows_to_batch(&[row(1, Some(1), true)]).unwrap();
        let schema = dim_customers_scd_schema();
        let mut arrays = full.columns().to_vec();
        let idx = schema.index_of(columns::EFFECTIVE_START_DATE).unwrap();
        arrays[idx] = Arc::new(Date32Array::from(vec![None::<i32>]));
        let batch = RecordBatch::try_new(schema, arrays).unwrap();

        let err = dimension_rows(&[batch]).unwrap_err();
        assert!(matches!(err, ScdError::Invariant { .. }), "{err}");
    }
}
