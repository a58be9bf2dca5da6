//! Shared test utilities for Strata integration tests.
//!
//! This crate provides:
//! - [`TracingMemoryBackend`]: In-memory storage with operation recording
//! - [`TestContext`]: Tracing storage plus the warehouse registry
//! - Factory functions for customers and orders
//! - Dimension assertion helpers
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_test_utils::{Customer, TestContext, assert_single_active, date};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let ctx = TestContext::new();
//!     ctx.seed_dimension(&[Customer::new(1, "Alice", 2).active_row(date(2024, 1, 1))]).await;
//!     assert_single_active(&ctx.dimension_rows().await);
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod assertions;
pub mod fixtures;
pub mod storage;

pub use assertions::*;
pub use fixtures::*;
pub use storage::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("strata_scd=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
