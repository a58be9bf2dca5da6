//! Property-based tests for dimension invariants.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated run sequences.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{NaiveDate, TimeDelta};
use proptest::prelude::*;

use strata_scd::{
    CustomerAttributes, DimensionRow, SourceRecord, build_changeset, merge_rows, sentinel_end_date,
};
use strata_test_utils::{assert_history_contiguous, assert_single_active};

/// Generates a record over a small key and value space so that runs
/// frequently revisit keys and repeat earlier values.
fn arb_record() -> impl Strategy<Value = SourceRecord> {
    (
        1i64..6,
        prop::option::of(prop::sample::select(vec!["Ann", "Ben", "Cy"])),
        prop::option::of(0i32..3),
        prop::option::of(prop::sample::select(vec!["555-0100", "555-0199"])),
    )
        .prop_map(|(customer_id, first_name, orders, phone)| SourceRecord {
            attributes: CustomerAttributes {
                customer_id,
                first_name: first_name.map(String::from),
                last_name: None,
                email: None,
                phone: phone.map(String::from),
                number_of_orders: orders,
            },
            updated_at: None,
        })
}

/// Generates a sequence of runs, each a batch of records.
fn arb_runs() -> impl Strategy<Value = Vec<Vec<SourceRecord>>> {
    prop::collection::vec(prop::collection::vec(arb_record(), 0..8), 1..8)
}

fn run_date(index: usize) -> NaiveDate {
    let days = i64::try_from(index).unwrap() * 7;
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + TimeDelta::days(days)
}

fn apply(table: &mut Vec<DimensionRow>, records: Vec<SourceRecord>, day: NaiveDate) -> usize {
    let active: Vec<DimensionRow> = table.iter().filter(|r| r.is_active).cloned().collect();
    let changeset = build_changeset(records, &active, day).unwrap();
    let before = table.len();
    merge_rows(table, &changeset).unwrap();
    table.len() - before
}

proptest! {
    #[test]
    fn every_key_keeps_exactly_one_active_version(runs in arb_runs()) {
        let mut table = Vec::new();
        for (idx, records) in runs.into_iter().enumerate() {
            apply(&mut table, records, run_date(idx));
            assert_single_active(&table);
        }
        assert_history_contiguous(&table);
    }

    #[test]
    fn identical_rerun_adds_no_rows(runs in arb_runs()) {
        let mut table = Vec::new();
        let last = runs.len() - 1;
        for (idx, records) in runs.iter().cloned().enumerate() {
            apply(&mut table, records, run_date(idx));
        }
        let snapshot = table.clone();
        let added = apply(&mut table, runs[last].clone(), run_date(last + 1));

        // Repeated keys inside one batch collapse to the last record, which
        // the previous run already applied.
        prop_assert_eq!(added, 0);
        prop_assert_eq!(table, snapshot);
    }

    #[test]
    fn closed_versions_never_change(runs in arb_runs()) {
        let mut table: Vec<DimensionRow> = Vec::new();
        for (idx, records) in runs.into_iter().enumerate() {
            let closed_before: Vec<DimensionRow> =
                table.iter().filter(|r| !r.is_active).cloned().collect();
            apply(&mut table, records, run_date(idx));
            for row in &closed_before {
                prop_assert!(table.contains(row));
            }
        }
        for row in table.iter().filter(|r| r.is_active) {
            prop_assert_eq!(row.effective_end_date, sentinel_end_date());
        }
    }
}
