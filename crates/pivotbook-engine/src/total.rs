//! Grand total reduction
//!
//! The grand total is recomputed from the final row set on every call; it is
//! never cached across groupings.

use pivotbook_core::{AggregateRow, BucketLayout, GroupKey, PlanFactRow};

/// Sums every field of a row set into one synthetic row
pub struct GrandTotalReducer;

impl GrandTotalReducer {
    pub fn reduce(layout: &BucketLayout, rows: &[AggregateRow]) -> AggregateRow {
        rows.iter().fold(
            AggregateRow::zeroed(GroupKey::grand_total(), layout),
            |mut acc, row| {
                acc += row;
                acc
            },
        )
    }

    pub fn reduce_plan_fact(rows: &[PlanFactRow]) -> PlanFactRow {
        rows.iter()
            .fold(PlanFactRow::zeroed(GroupKey::grand_total()), |mut acc, row| {
                acc += row;
                acc
            })
    }
}
