//! SCD Type-2 dimension maintenance and derived extracts for Strata.
//!
//! The customer dimension keeps every historical version of a customer. Each
//! reconcile run compares the customers changed in a date range against the
//! active versions and merges the difference as one atomic table commit:
//!
//! - a changed customer's active version is closed on the run date and a new
//!   version is opened;
//! - an unseen customer gets a first version;
//! - an unchanged customer is left alone.
//!
//! The future orders extract is derived from the active dimension and the
//! orders fact table, and is rebuilt in full by every run.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod codec;
pub mod dimension;
pub mod error;
pub mod jobs;
pub mod merge;
pub mod model;
pub mod query;
pub mod reconcile;
pub mod schemas;
pub mod source;

pub use dimension::{ActiveSnapshot, DimensionTable};
pub use error::{Result, ScdError};
pub use jobs::{
    ExtractOutcome, FutureOrdersJob, LoadOutcome, ReconcileJob, ReconcileOutcome, create_table,
    drop_table, load_json_lines,
};
pub use merge::{MergeStats, merge_rows};
pub use model::{Changeset, CustomerAttributes, DimensionRow, SourceRecord, sentinel_end_date};
pub use query::{AnalyticsEngine, DataFusionEngine, WarehouseConfig};
pub use reconcile::build_changeset;
pub use source::{CustomerSource, JsonLinesSource, StaticSource};
