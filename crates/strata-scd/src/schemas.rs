//! Warehouse table definitions: names, schemas, locations, and crawlers.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use strata_core::{StaticRegistry, TableMetadata};

/// Customer dimension (SCD Type 2).
pub const DIM_CUSTOMERS_SCD: &str = "dim_customers_scd";
/// Orders fact table.
pub const ORDERS: &str = "orders";
/// Future orders reporting extract.
pub const FUTURE_ORDERS: &str = "future_orders";

/// Crawler refreshed after the customer dimension changes.
pub const DIM_CUSTOMERS_CRAWLER: &str = "dimCustomersScdCrawler";
/// Crawler refreshed after the future orders extract is rewritten.
pub const FUTURE_ORDERS_CRAWLER: &str = "weeklyStreamlineOrdersCrawler";

/// Column names of the customer dimension.
pub mod columns {
    /// Natural key.
    pub const CUSTOMER_ID: &str = "customer_id";
    /// Tracked attribute.
    pub const FIRST_NAME: &str = "first_name";
    /// Tracked attribute.
    pub const LAST_NAME: &str = "last_name";
    /// Tracked attribute.
    pub const EMAIL: &str = "email";
    /// Tracked attribute.
    pub const PHONE: &str = "phone";
    /// Tracked attribute.
    pub const NUMBER_OF_ORDERS: &str = "number_of_orders";
    /// Source system change timestamp (metadata only).
    pub const UPDATED_AT: &str = "updated_at";
    /// Validity interval start.
    pub const EFFECTIVE_START_DATE: &str = "effective_start_date";
    /// Validity interval end (`9999-12-31` while open).
    pub const EFFECTIVE_END_DATE: &str = "effective_end_date";
    /// Denormalized "is current" flag.
    pub const IS_ACTIVE: &str = "is_active";
}

fn utc_timestamp() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

// pickup_date is a shop-local wall-clock time, so it carries no timezone.
fn local_timestamp() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, None)
}

/// Schema of the customer dimension.
#[must_use]
pub fn dim_customers_scd_schema() -> SchemaRef {
    use columns::*;
    Arc::new(Schema::new(vec![
        Field::new(CUSTOMER_ID, DataType::Int64, false),
        Field::new(FIRST_NAME, DataType::Utf8, true),
        Field::new(LAST_NAME, DataType::Utf8, true),
        Field::new(EMAIL, DataType::Utf8, true),
        Field::new(PHONE, DataType::Utf8, true),
        Field::new(NUMBER_OF_ORDERS, DataType::Int32, true),
        Field::new(UPDATED_AT, utc_timestamp(), true),
        Field::new(EFFECTIVE_START_DATE, DataType::Date32, true),
        Field::new(EFFECTIVE_END_DATE, DataType::Date32, true),
        Field::new(IS_ACTIVE, DataType::Boolean, true),
    ]))
}

/// Schema of the orders fact table.
#[must_use]
pub fn orders_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("order_id", DataType::Int64, true),
        Field::new("order_name", DataType::Utf8, true),
        Field::new("created_at", utc_timestamp(), true),
        Field::new("processed_at", utc_timestamp(), true),
        Field::new("updated_at", utc_timestamp(), true),
        Field::new("financial_status", DataType::Utf8, true),
        Field::new("customer_id", DataType::Int64, true),
        Field::new("total_price", DataType::Decimal128(20, 4), true),
        Field::new("draft_type", DataType::Utf8, true),
        Field::new("theme", DataType::Utf8, true),
        Field::new("flavor", DataType::Utf8, true),
        Field::new("allergies", DataType::Utf8, true),
        Field::new("pickup_date", local_timestamp(), true),
    ]))
}

/// Schema of the future orders extract.
#[must_use]
pub fn future_orders_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("order_name", DataType::Utf8, true),
        Field::new("first_name", DataType::Utf8, true),
        Field::new("financial_status", DataType::Utf8, true),
        Field::new("draft_type", DataType::Utf8, true),
        Field::new("theme", DataType::Utf8, true),
        Field::new("flavor", DataType::Utf8, true),
        Field::new("allergies", DataType::Utf8, true),
        Field::new("pickup_date", local_timestamp(), true),
    ]))
}

/// Registry with the warehouse's tables at their standard locations.
#[must_use]
pub fn warehouse_registry() -> StaticRegistry {
    StaticRegistry::new()
        .with_table(TableMetadata::new(
            DIM_CUSTOMERS_SCD,
            dim_customers_scd_schema(),
            "gold/dim_customers_scd",
        ))
        .with_table(TableMetadata::new(
            ORDERS,
            orders_schema(),
            "silver/orders",
        ))
        .with_table(TableMetadata::new(
            FUTURE_ORDERS,
            future_orders_schema(),
            "gold/future_orders",
        ))
}

#[cfg(test)]
mod tests {
    use strata_core::SchemaRegistry as _;

    use super::*;

    #[test]
    fn registry_knows_every_warehouse_table() {
        let registry = warehouse_registry();
        for name in [DIM_CUSTOMERS_SCD, ORDERS, FUTURE_ORDERS] {
            let meta = registry.lookup(name).expect("registered");
            assert_eq!(meta.name, name);
        }
        assert_eq!(
            registry.lookup(DIM_CUSTOMERS_SCD).unwrap().location,
            "gold/dim_customers_scd"
        );
    }

    #[test]
    fn natural_key_is_required() {
        let schema = dim_customers_scd_schema();
        let key = schema.field_with_name(columns::CUSTOMER_ID).unwrap();
        assert!(!key.is_nullable());
    }
}
