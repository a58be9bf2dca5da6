//! # strata-core
//!
//! Core abstractions for Strata's batch warehouse jobs.
//!
//! - **Storage**: object storage backends with conditional writes
//! - **Tables**: versioned Parquet snapshots with atomic commit and overwrite
//! - **Schemas**: a registry of table schemas and strict schema casting
//! - **Catalog**: fire-and-forget crawler refresh after writes
//! - **Observability**: logging initialization and job spans
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use strata_core::{MemoryBackend, TableStore};
//!
//! let table = TableStore::new(Arc::new(MemoryBackend::new()), "gold/dim_customers_scd");
//! assert_eq!(table.location(), "gold/dim_customers_scd");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cast;
pub mod catalog;
pub mod error;
pub mod observability;
pub mod parquet_util;
pub mod registry;
pub mod storage;
pub mod table;

pub use cast::{cast_batches, cast_to_schema};
pub use catalog::{
    CatalogRefresher, CrawlerStart, HttpCrawlerClient, LoggingRefresher, refresh_catalog,
};
pub use error::{Error, Result};
pub use observability::{LogFormat, Redacted, init_logging, job_span};
pub use registry::{SchemaRegistry, StaticRegistry, TableMetadata};
pub use storage::{
    MemoryBackend, ObjectMeta, ObjectStoreBackend, StorageBackend, WritePrecondition, WriteResult,
};
pub use table::{TableSnapshot, TableStore};
