//! Conditional upsert of a changeset into the dimension rows.
//!
//! An incoming row matches a target row when the target is active, has the
//! same natural key, and carries identical tracked attributes. A matched target
//! is replaced wholesale by the incoming row; an unmatched incoming row is
//! appended. Restricting matches to active targets keeps historical versions
//! immutable when a customer returns to an earlier set of values.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScdError};
use crate::model::{Changeset, DimensionRow};

/// Counts reported by a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Versions closed by this run.
    pub closed: usize,
    /// New versions opened for existing keys.
    pub new_versions: usize,
    /// Keys seen for the first time.
    pub new_keys: usize,
    /// Target rows replaced by a matching incoming row.
    pub updated: usize,
    /// Incoming rows appended.
    pub inserted: usize,
}

enum Action<'a> {
    Update(usize, &'a DimensionRow),
    Insert(&'a DimensionRow),
}

/// Applies `changeset` to `target` in place.
///
/// Matching is planned against the pre-merge rows and then applied in one
/// step, so the outcome does not depend on the order of the incoming rows.
/// On error `target` is left untouched.
///
/// # Errors
///
/// Returns [`ScdError::Invariant`] if an incoming row matches more than one
/// target row, or if two incoming rows match the same target row.
pub fn merge_rows(target: &mut Vec<DimensionRow>, changeset: &Changeset) -> Result<MergeStats> {
    let mut active: HashMap<i64, Vec<usize>> = HashMap::new();
    for (idx, row) in target.iter().enumerate().filter(|(_, row)| row.is_active) {
        active.entry(row.customer_id()).or_default().push(idx);
    }

    let mut claimed = HashSet::new();
    let mut plan = Vec::with_capacity(changeset.len());
    for incoming in changeset.rows() {
        let matches: Vec<usize> = active
            .get(&incoming.customer_id())
            .into_iter()
            .flatten()
            .copied()
            .filter(|&idx| !target[idx].attributes.differs_from(&incoming.attributes))
            .collect();

        match matches.as_slice() {
            [] => plan.push(Action::Insert(incoming)),
            [idx] => {
                if !claimed.insert(*idx) {
                    return Err(ScdError::invariant(format!(
                        "customer {}: several incoming rows match the same version",
                        incoming.customer_id()
                    )));
                }
                plan.push(Action::Update(*idx, incoming));
            }
            _ => {
                return Err(ScdError::invariant(format!(
                    "customer {}: incoming row matches {} active versions",
                    incoming.customer_id(),
                    matches.len()
                )));
            }
        }
    }

    let mut stats = MergeStats {
        closed: changeset.closed.len(),
        new_versions: changeset.new_versions.len(),
        new_keys: changeset.new_keys.len(),
        ..MergeStats::default()
    };
    for action in plan {
        match action {
            Action::Update(idx, row) => {
                target[idx] = row.clone();
                stats.updated += 1;
            }
            Action::Insert(row) => {
                target.push(row.clone());
                stats.inserted += 1;
            }
        }
    }
    Ok(stats)
}
