//! Extract sources for the customer dimension.
//!
//! A source returns the customers changed within a date range as a loosely
//! typed record batch. The reconcile job casts it onto the registered schema,
//! so sources do not need to know the dimension's exact column types.

use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::error::{Result, ScdError};
use crate::schemas::columns;

/// Source of changed customer records.
#[async_trait]
pub trait CustomerSource: Send + Sync {
    /// Returns customers whose `updated_at` date lies in `[start, end]`.
    ///
    /// `None` means nothing changed in the range. It is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ScdError::Source`] if the source cannot be read.
    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<Option<RecordBatch>>;
}

/// Schema of batches produced by [`JsonLinesSource`].
#[must_use]
pub fn raw_customer_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(columns::CUSTOMER_ID, DataType::Int64, true),
        Field::new(columns::FIRST_NAME, DataType::Utf8, true),
        Field::new(columns::LAST_NAME, DataType::Utf8, true),
        Field::new(columns::EMAIL, DataType::Utf8, true),
        Field::new(columns::PHONE, DataType::Utf8, true),
        Field::new(columns::NUMBER_OF_ORDERS, DataType::Int64, true),
        Field::new(columns::UPDATED_AT, DataType::Utf8, true),
    ]))
}

#[derive(Debug, Deserialize)]
struct RawCustomer {
    #[serde(alias = "id")]
    customer_id: Option<i64>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    #[serde(alias = "orders_count")]
    number_of_orders: Option<i64>,
    updated_at: Option<String>,
}

/// Reads customers from a newline-delimited JSON export.
///
/// Accepts both dimension column names and the shop API's names (`id`,
/// `orders_count`). Records without an `updated_at` are skipped.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    path: PathBuf,
}

impl JsonLinesSource {
    /// Creates a source over the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parse(&self, content: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<RawCustomer>> {
        let mut selected = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let customer: RawCustomer = serde_json::from_str(line).map_err(|e| {
                ScdError::extract(format!("{}:{}: {e}", self.path.display(), idx + 1))
            })?;
            let Some(raw) = customer.updated_at.as_deref() else {
                tracing::debug!(line = idx + 1, "skipping customer without updated_at");
                continue;
            };
            let updated = DateTime::parse_from_rfc3339(raw).map_err(|e| {
                ScdError::extract(format!(
                    "{}:{}: bad updated_at '{raw}': {e}",
                    self.path.display(),
                    idx + 1
                ))
            })?;
            let day = updated.with_timezone(&Utc).date_naive();
            if start <= day && day <= end {
                selected.push(customer);
            }
        }
        Ok(selected)
    }
}

#[async_trait]
impl CustomerSource for JsonLinesSource {
    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<Option<RecordBatch>> {
        if start > end {
            return Err(ScdError::invalid_input(format!(
                "start date {start} is after end date {end}"
            )));
        }
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ScdError::extract(format!("read {}: {e}", self.path.display())))?;
        let customers = self.parse(&content, start, end)?;
        tracing::debug!(
            path = %self.path.display(),
            %start,
            %end,
            records = customers.len(),
            "read customer export"
        );
        if customers.is_empty() {
            return Ok(None);
        }

        let strings =
            |values: Vec<Option<&str>>| -> ArrayRef { Arc::new(StringArray::from(values)) };
        let columns: Vec<ArrayRef> = vec![
            Arc::new(customers.iter().map(|c| c.customer_id).collect::<Int64Array>()),
            strings(customers.iter().map(|c| c.first_name.as_deref()).collect()),
            strings(customers.iter().map(|c| c.last_name.as_deref()).collect()),
            strings(customers.iter().map(|c| c.email.as_deref()).collect()),
            strings(customers.iter().map(|c| c.phone.as_deref()).collect()),
            Arc::new(
                customers
                    .iter()
                    .map(|c| c.number_of_orders)
                    .collect::<Int64Array>(),
            ),
            strings(customers.iter().map(|c| c.updated_at.as_deref()).collect()),
        ];
        RecordBatch::try_new(raw_customer_schema(), columns)
            .map(Some)
            .map_err(|e| ScdError::extract(format!("build customer batch: {e}")))
    }
}

/// Serves a fixed batch regardless of the requested range.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    batch: Option<RecordBatch>,
}

impl StaticSource {
    /// Creates a source that always returns `batch`.
    #[must_use]
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch: Some(batch) }
    }

    /// Creates a source that never has changes.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerSource for StaticSource {
    async fn fetch(&self, _start: NaiveDate, _end: NaiveDate) -> Result<Option<RecordBatch>> {
        Ok(self.batch.clone().filter(|batch| batch.num_rows() > 0))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn export(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[tokio::test]
    async fn keeps_records_inside_the_range() {
        let file = export(&[
            r#"{"id": 1, "first_name": "Alice", "orders_count": 3, "updated_at": "2024-05-02T08:00:00Z"}"#,
            "",
            r#"{"customer_id": 2, "first_name": "Bob", "number_of_orders": 1, "updated_at": "2024-05-31T23:59:59+00:00"}"#,
            r#"{"id": 3, "first_name": "Carol", "updated_at": "2024-06-01T00:00:00Z"}"#,
            r#"{"id": 4, "first_name": "Dan"}"#,
        ]);
        let source = JsonLinesSource::new(file.path());
        let batch = source
            .fetch(date(2024, 5, 1), date(2024, 5, 31))
            .await
            .unwrap()
            .expect("two records in range");

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema(), raw_customer_schema());
        let ids = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(ids.values().to_vec(), vec![1, 2]);
    }

    #[tokio::test]
    async fn nothing_in_range_is_none() {
        let file = export(&[
            r#"{"id": 1, "updated_at": "2024-01-02T08:00:00Z"}"#,
        ]);
        let source = JsonLinesSource::new(file.path());
        assert!(
            source
                .fetch(date(2024, 5, 1), date(2024, 5, 31))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn malformed_line_is_a_source_error() {
        let file = export(&["{not json"]);
        let err = JsonLinesSource::new(file.path())
            .fetch(date(2024, 5, 1), date(2024, 5, 31))
            .await
            .unwrap_err();
        assert!(matches!(err, ScdError::Source { .. }), "{err}");
    }

    #[tokio::test]
    async fn inverted_range_is_rejected() {
        let file = export(&[]);
        let err = JsonLinesSource::new(file.path())
            .fetch(date(2024, 6, 1), date(2024, 5, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ScdError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn static_source_treats_empty_batch_as_no_changes() {
        let empty = RecordBatch::new_empty(raw_customer_schema());
        let source = StaticSource::new(empty);
        assert!(
            source
                .fetch(date(2024, 5, 1), date(2024, 5, 31))
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            StaticSource::empty()
                .fetch(date(2024, 5, 1), date(2024, 5, 31))
                .await
                .unwrap()
                .is_none()
        );
    }
}
