//! Pre-built test fixtures for common test scenarios.
//!
//! Provides factory functions to create test data with sensible defaults.

use std::sync::{Arc, Mutex};

use arrow::array::{ArrayRef, Decimal128Array, Int64Array, StringArray, TimestampMicrosecondArray};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta, Utc};
use strata_core::{
    CatalogRefresher, CrawlerStart, SchemaRegistry as _, StaticRegistry, StorageBackend, TableStore,
};
use strata_scd::schemas::{DIM_CUSTOMERS_SCD, ORDERS, orders_schema, warehouse_registry};
use strata_scd::source::raw_customer_schema;
use strata_scd::{DimensionRow, DimensionTable, codec};

use crate::storage::TracingMemoryBackend;

/// Shorthand for a calendar date.
#[must_use]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// Test context with tracing storage and the warehouse registry.
pub struct TestContext {
    /// Shared storage backend.
    pub storage: Arc<TracingMemoryBackend>,
    /// Registry with the warehouse tables at their standard locations.
    pub registry: Arc<StaticRegistry>,
}

impl TestContext {
    /// Creates a context with empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: Arc::new(TracingMemoryBackend::new()),
            registry: Arc::new(warehouse_registry()),
        }
    }

    /// Returns the storage as a trait object.
    #[must_use]
    pub fn backend(&self) -> Arc<dyn StorageBackend> {
        self.storage.clone()
    }

    /// Returns a table store for a registry table.
    #[must_use]
    pub fn table(&self, name: &str) -> TableStore {
        let metadata = self.registry.lookup(name).expect("registered table");
        TableStore::new(self.backend(), metadata.location)
    }

    /// Returns the customer dimension.
    #[must_use]
    pub fn dimension(&self) -> DimensionTable {
        let metadata = self.registry.lookup(DIM_CUSTOMERS_SCD).expect("registered table");
        DimensionTable::new(self.table(DIM_CUSTOMERS_SCD), &metadata)
    }

    /// Creates the dimension holding `rows`.
    pub async fn seed_dimension(&self, rows: &[DimensionRow]) {
        let metadata = self.registry.lookup(DIM_CUSTOMERS_SCD).expect("registered table");
        let batch = codec::rows_to_batch(rows).expect("encode rows");
        let batch = strata_core::cast_to_schema(&batch, &metadata.schema).expect("cast rows");
        self.table(DIM_CUSTOMERS_SCD)
            .overwrite(&metadata.schema, &[batch])
            .await
            .expect("seed dimension");
    }

    /// Writes `orders` as the orders fact table.
    pub async fn seed_orders(&self, orders: &[Order]) {
        self.table(ORDERS)
            .overwrite(&orders_schema(), &[orders_batch(orders)])
            .await
            .expect("seed orders");
    }

    /// Reads every stored dimension row.
    pub async fn dimension_rows(&self) -> Vec<DimensionRow> {
        self.dimension().read_all().await.expect("read dimension").1
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A customer as exported by the shop system.
#[derive(Debug, Clone)]
pub struct Customer {
    /// Natural key.
    pub id: i64,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Order count.
    pub orders: Option<i64>,
    /// RFC 3339 change timestamp.
    pub updated_at: Option<String>,
}

impl Customer {
    /// Creates a customer with a derived email and the given order count.
    #[must_use]
    pub fn new(id: i64, first_name: &str, orders: i64) -> Self {
        Self {
            id,
            first_name: Some(first_name.to_string()),
            last_name: Some("Tester".to_string()),
            email: Some(format!("{}@example.com", first_name.to_lowercase())),
            phone: None,
            orders: Some(orders),
            updated_at: Some("2024-05-15T09:30:00Z".to_string()),
        }
    }

    /// Sets the change timestamp.
    #[must_use]
    pub fn updated_at(mut self, rfc3339: &str) -> Self {
        self.updated_at = Some(rfc3339.to_string());
        self
    }

    /// Sets the phone number.
    #[must_use]
    pub fn phone(mut self, phone: Option<&str>) -> Self {
        self.phone = phone.map(str::to_string);
        self
    }

    /// Returns this customer as an active dimension row opened on `start`.
    #[must_use]
    pub fn active_row(&self, start: NaiveDate) -> DimensionRow {
        let batch = customer_batch(std::slice::from_ref(self));
        let batch = strata_core::cast_to_schema(
            &batch,
            &strata_scd::schemas::dim_customers_scd_schema(),
        )
        .expect("cast customer");
        let record = codec::source_records(&batch)
            .expect("decode customer")
            .remove(0);
        DimensionRow::open(record, start)
    }
}

/// Builds a raw extract batch as a customer source would return it.
#[must_use]
pub fn customer_batch(customers: &[Customer]) -> RecordBatch {
    let strings = |values: Vec<Option<&str>>| -> ArrayRef { Arc::new(StringArray::from(values)) };
    RecordBatch::try_new(
        raw_customer_schema(),
        vec![
            Arc::new(Int64Array::from(
                customers.iter().map(|c| Some(c.id)).collect::<Vec<_>>(),
            )),
            strings(customers.iter().map(|c| c.first_name.as_deref()).collect()),
            strings(customers.iter().map(|c| c.last_name.as_deref()).collect()),
            strings(customers.iter().map(|c| c.email.as_deref()).collect()),
            strings(customers.iter().map(|c| c.phone.as_deref()).collect()),
            Arc::new(Int64Array::from(
                customers.iter().map(|c| c.orders).collect::<Vec<_>>(),
            )),
            strings(customers.iter().map(|c| c.updated_at.as_deref()).collect()),
        ],
    )
    .expect("customer batch")
}

/// An order in the fact table.
#[derive(Debug, Clone)]
pub struct Order {
    /// Order identifier.
    pub order_id: i64,
    /// Display name, e.g. `#1001`.
    pub order_name: String,
    /// Ordering customer.
    pub customer_id: i64,
    /// Payment state.
    pub financial_status: String,
    /// Cake or box type.
    pub draft_type: String,
    /// Decoration theme.
    pub theme: Option<String>,
    /// Flavor.
    pub flavor: Option<String>,
    /// Allergy notes.
    pub allergies: Option<String>,
    /// Shop-local pickup time.
    pub pickup_date: NaiveDateTime,
}

impl Order {
    /// Creates a paid order picked up `days_from_today` days from now
    /// (negative for the past).
    #[must_use]
    pub fn new(order_id: i64, customer_id: i64, days_from_today: i64) -> Self {
        let pickup = Utc::now().date_naive() + TimeDelta::days(days_from_today);
        Self {
            order_id,
            order_name: format!("#{order_id}"),
            customer_id,
            financial_status: "paid".to_string(),
            draft_type: "cake".to_string(),
            theme: Some("birthday".to_string()),
            flavor: Some("vanilla".to_string()),
            allergies: None,
            pickup_date: pickup.and_hms_opt(10, 0, 0).expect("valid time"),
        }
    }
}

/// Builds an orders fact batch.
#[must_use]
pub fn orders_batch(orders: &[Order]) -> RecordBatch {
    let strings = |values: Vec<Option<&str>>| -> ArrayRef { Arc::new(StringArray::from(values)) };
    let timestamps = |values: Vec<Option<i64>>| -> ArrayRef {
        Arc::new(TimestampMicrosecondArray::from(values).with_timezone("UTC"))
    };
    let created: Vec<Option<i64>> = orders
        .iter()
        .map(|o| Some(o.pickup_date.and_utc().timestamp_micros() - 86_400_000_000 * 7))
        .collect();

    RecordBatch::try_new(
        orders_schema(),
        vec![
            Arc::new(Int64Array::from(
                orders.iter().map(|o| o.order_id).collect::<Vec<_>>(),
            )),
            strings(orders.iter().map(|o| Some(o.order_name.as_str())).collect()),
            timestamps(created.clone()),
            timestamps(created.clone()),
            timestamps(created),
            strings(
                orders
                    .iter()
                    .map(|o| Some(o.financial_status.as_str()))
                    .collect(),
            ),
            Arc::new(Int64Array::from(
                orders.iter().map(|o| o.customer_id).collect::<Vec<_>>(),
            )),
            Arc::new(
                Decimal128Array::from(vec![Some(45_000_000_i128); orders.len()])
                    .with_precision_and_scale(20, 4)
                    .expect("decimal"),
            ),
            strings(orders.iter().map(|o| Some(o.draft_type.as_str())).collect()),
            strings(orders.iter().map(|o| o.theme.as_deref()).collect()),
            strings(orders.iter().map(|o| o.flavor.as_deref()).collect()),
            strings(orders.iter().map(|o| o.allergies.as_deref()).collect()),
            Arc::new(TimestampMicrosecondArray::from(
                orders
                    .iter()
                    .map(|o| o.pickup_date.and_utc().timestamp_micros())
                    .collect::<Vec<_>>(),
            )),
        ],
    )
    .expect("orders batch")
}

/// Catalog refresher that records crawler names and can be made to fail.
#[derive(Debug, Default)]
pub struct RecordingRefresher {
    started: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingRefresher {
    /// Creates a refresher that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a refresher whose every request fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Returns the crawler names requested so far.
    #[must_use]
    pub fn started(&self) -> Vec<String> {
        self.started.lock().expect("lock").clone()
    }
}

#[async_trait]
impl CatalogRefresher for RecordingRefresher {
    async fn start_crawler(&self, crawler: &str) -> strata_core::Result<CrawlerStart> {
        self.started.lock().expect("lock").push(crawler.to_string());
        if self.fail {
            return Err(strata_core::Error::storage(format!(
                "crawler {crawler} unavailable"
            )));
        }
        Ok(CrawlerStart::Started)
    }
}
