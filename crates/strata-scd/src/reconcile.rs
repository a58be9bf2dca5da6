//! Change detection: routes extracted records against the active dimension.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::NaiveDate;

use crate::error::{Result, ScdError};
use crate::model::{Changeset, DimensionRow, SourceRecord};

/// Builds the changeset for one run.
///
/// Each source record is joined on the natural key against the active rows:
///
/// - no active row: a new key, opened on `run_date`;
/// - active row with different tracked attributes: the active row is closed on
///   `run_date` and a new version is opened;
/// - active row with identical tracked attributes: nothing.
///
/// Repeated keys in `source` collapse to the record with the latest
/// `updated_at`; on a tie the later record wins.
///
/// # Errors
///
/// Returns [`ScdError::Invariant`] if `active` holds more than one row for a
/// key or contains a row that is not active, and [`ScdError::InvalidInput`] if
/// `run_date` falls before the start of a version it would close.
pub fn build_changeset(
    source: Vec<SourceRecord>,
    active: &[DimensionRow],
    run_date: NaiveDate,
) -> Result<Changeset> {
    let active = index_active(active)?;
    let mut changeset = Changeset::default();

    for (customer_id, record) in latest_per_key(source) {
        match active.get(&customer_id) {
            None => changeset
                .new_keys
                .push(DimensionRow::open(record, run_date)),
            Some(current) if record.attributes.differs_from(&current.attributes) => {
                if run_date < current.effective_start_date {
                    return Err(ScdError::invalid_input(format!(
                        "run date {run_date} is before customer {customer_id}'s active version \
                         starting {}",
                        current.effective_start_date
                    )));
                }
                if let (Some(incoming), Some(stored)) =
                    (record.updated_at, current.source_updated_at)
                {
                    if incoming < stored {
                        tracing::warn!(
                            customer_id,
                            %incoming,
                            %stored,
                            "source record is older than the active version; applying it anyway"
                        );
                    }
                }
                changeset.closed.push(current.closed(run_date));
                changeset
                    .new_versions
                    .push(DimensionRow::open(record, run_date));
            }
            Some(_) => {}
        }
    }

    tracing::debug!(
        closed = changeset.closed.len(),
        new_versions = changeset.new_versions.len(),
        new_keys = changeset.new_keys.len(),
        "built changeset"
    );
    Ok(changeset)
}

fn index_active(active: &[DimensionRow]) -> Result<BTreeMap<i64, &DimensionRow>> {
    let mut index = BTreeMap::new();
    for row in active {
        if !row.is_active {
            return Err(ScdError::invariant(format!(
                "customer {} passed as active but is closed",
                row.customer_id()
            )));
        }
        if index.insert(row.customer_id(), row).is_some() {
            return Err(ScdError::invariant(format!(
                "customer {} has more than one active version",
                row.customer_id()
            )));
        }
    }
    Ok(index)
}

fn latest_per_key(source: Vec<SourceRecord>) -> BTreeMap<i64, SourceRecord> {
    let mut latest: BTreeMap<i64, SourceRecord> = BTreeMap::new();
    for record in source {
        match latest.entry(record.attributes.customer_id) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                // None sorts before any timestamp.
                if record.updated_at >= slot.get().updated_at {
                    slot.insert(record);
                }
            }
        }
    }
    latest
}
