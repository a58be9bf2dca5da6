//! Customer dimension rows and the changeset handed to the merge.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// End date of a version that is still open.
#[must_use]
pub fn sentinel_end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Natural key plus the tracked business attributes of a customer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerAttributes {
    /// Natural key from the source system.
    pub customer_id: i64,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Running order count.
    pub number_of_orders: Option<i32>,
}

impl CustomerAttributes {
    /// Returns true if any tracked attribute differs from `other`.
    ///
    /// Comparison is exact and null-aware: `None` vs `Some(_)` is a change.
    /// The natural key and all timestamps are outside the comparison.
    #[must_use]
    pub fn differs_from(&self, other: &Self) -> bool {
        self.first_name != other.first_name
            || self.last_name != other.last_name
            || self.email != other.email
            || self.phone != other.phone
            || self.number_of_orders != other.number_of_orders
    }
}

/// One record from the extract, already cast to the dimension schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Key and tracked attributes.
    pub attributes: CustomerAttributes,
    /// When the source system last changed the record.
    pub updated_at: Option<DateTime<Utc>>,
}

/// One version of a customer in the dimension table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionRow {
    /// Key and tracked attributes.
    pub attributes: CustomerAttributes,
    /// Source change timestamp this version was built from.
    pub source_updated_at: Option<DateTime<Utc>>,
    /// First day this version is valid.
    pub effective_start_date: NaiveDate,
    /// Day this version was superseded, or [`sentinel_end_date`].
    pub effective_end_date: NaiveDate,
    /// True for the current version of the key.
    pub is_active: bool,
}

impl DimensionRow {
    /// Opens a new active version from a source record.
    #[must_use]
    pub fn open(record: SourceRecord, run_date: NaiveDate) -> Self {
        Self {
            attributes: record.attributes,
            source_updated_at: record.updated_at,
            effective_start_date: run_date,
            effective_end_date: sentinel_end_date(),
            is_active: true,
        }
    }

    /// Returns this version closed on `run_date`.
    ///
    /// Only the end date and the active flag change.
    #[must_use]
    pub fn closed(&self, run_date: NaiveDate) -> Self {
        Self {
            effective_end_date: run_date,
            is_active: false,
            ..self.clone()
        }
    }

    /// Natural key of this row.
    #[must_use]
    pub fn customer_id(&self) -> i64 {
        self.attributes.customer_id
    }

    /// True if the validity interval is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.effective_end_date == sentinel_end_date()
    }
}

/// Rows to merge into the dimension for one run.
///
/// The three groups are disjoint by construction. Group order carries no
/// meaning: the merge predicate alone decides update vs insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset {
    /// Superseded versions: old values, end date = run date, inactive.
    pub closed: Vec<DimensionRow>,
    /// New versions of existing keys: new values, start date = run date.
    pub new_versions: Vec<DimensionRow>,
    /// First versions of keys never seen before.
    pub new_keys: Vec<DimensionRow>,
}

impl Changeset {
    /// True if there is nothing to merge.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.closed.is_empty() && self.new_versions.is_empty() && self.new_keys.is_empty()
    }

    /// Total number of rows across all groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.closed.len() + self.new_versions.len() + self.new_keys.len()
    }

    /// All rows as one union.
    pub fn rows(&self) -> impl Iterator<Item = &DimensionRow> {
        self.closed
            .iter()
            .chain(&self.new_versions)
            .chain(&self.new_keys)
    }
}
