//! Custom assertion helpers for dimension tests.

use std::collections::BTreeMap;

use strata_scd::{DimensionRow, sentinel_end_date};

use crate::storage::{StorageOp, TracingMemoryBackend};

/// Asserts that every key has exactly one active row, and that it is open.
///
/// # Panics
///
/// Panics if a key has zero or several active rows, or an active row with a
/// closed interval.
pub fn assert_single_active(rows: &[DimensionRow]) {
    let mut active: BTreeMap<i64, usize> = BTreeMap::new();
    for row in rows {
        let count = active.entry(row.customer_id()).or_default();
        if row.is_active {
            *count += 1;
            assert_eq!(
                row.effective_end_date,
                sentinel_end_date(),
                "Active row for customer {} has end date {}",
                row.customer_id(),
                row.effective_end_date
            );
        }
    }
    for (customer_id, count) in active {
        assert_eq!(
            count, 1,
            "Expected one active row for customer {customer_id}, found {count}"
        );
    }
}

/// Asserts that each key's versions tile time without gaps or overlaps.
///
/// Versions are ordered by start date; every version but the last must be
/// inactive and end on the day its successor starts.
///
/// # Panics
///
/// Panics on any gap, overlap, or misplaced active row.
pub fn assert_history_contiguous(rows: &[DimensionRow]) {
    let mut by_key: BTreeMap<i64, Vec<&DimensionRow>> = BTreeMap::new();
    for row in rows {
        by_key.entry(row.customer_id()).or_default().push(row);
    }
    for (customer_id, mut versions) in by_key {
        versions.sort_by_key(|row| (row.effective_start_date, row.is_active));
        for pair in versions.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            assert!(
                !prev.is_active,
                "Customer {customer_id}: version starting {} is active but superseded",
                prev.effective_start_date
            );
            assert_eq!(
                prev.effective_end_date, next.effective_start_date,
                "Customer {customer_id}: version ends {} but successor starts {}",
                prev.effective_end_date, next.effective_start_date
            );
        }
        let last = versions.last().expect("at least one version");
        assert!(
            last.is_active,
            "Customer {customer_id}: latest version is not active"
        );
    }
}

/// Asserts that no storage object was written or deleted.
///
/// # Panics
///
/// Panics if a put or delete was recorded.
pub fn assert_no_mutations(storage: &TracingMemoryBackend) {
    let mutations = storage.mutations();
    assert!(
        mutations.is_empty(),
        "Expected no writes, but found: {mutations:?}"
    );
}

/// Counts recorded puts under `prefix`.
#[must_use]
pub fn count_puts(ops: &[StorageOp], prefix: &str) -> usize {
    ops.iter()
        .filter(|op| matches!(op, StorageOp::Put { path, .. } if path.starts_with(prefix)))
        .count()
}
