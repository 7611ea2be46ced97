//! Group aggregation
//!
//! Single pass over bucketed records, folding them into one [`AggregateRow`]
//! per distinct group key. Keys compare case- and whitespace-insensitively;
//! rows keep the first-seen labels and appear in first-seen order.

use pivotbook_core::{AggregateRow, BucketLayout, BucketedRecord, GroupKey, PivotError, TimeBucket};
use std::collections::HashMap;

/// Folds bucketed records over a fixed bucket layout
#[derive(Debug, Clone, Copy)]
pub struct GroupAggregator<'a> {
    layout: &'a BucketLayout,
}

impl<'a> GroupAggregator<'a> {
    pub fn new(layout: &'a BucketLayout) -> Self {
        Self { layout }
    }

    /// Aggregate records; every row has a value for every layout bucket
    ///
    /// Fails with `LayoutMismatch` if a record carries a dated bucket the
    /// layout does not know, which would otherwise silently lose its measure.
    pub fn aggregate(&self, records: &[BucketedRecord]) -> Result<Vec<AggregateRow>, PivotError> {
        let mut index: HashMap<GroupKey, usize> = HashMap::new();
        let mut rows: Vec<AggregateRow> = Vec::new();

        for record in records {
            let key = GroupKey::new(record.dimensions.clone());
            let pos = match index.get(&key) {
                Some(&pos) => pos,
                None => {
                    let pos = rows.len();
                    rows.push(AggregateRow::zeroed(key.clone(), self.layout));
                    index.insert(key, pos);
                    pos
                }
            };
            let row = &mut rows[pos];

            match record.bucket {
                TimeBucket::NoDate => row.no_date += record.measure,
                bucket => {
                    let column = self.layout.position(&bucket).ok_or_else(|| {
                        PivotError::LayoutMismatch(format!(
                            "bucket {bucket} is not part of the {} layout",
                            self.layout.reporting_year()
                        ))
                    })?;
                    row.buckets[column] += record.measure;
                }
            }
            row.total += record.measure;
        }

        Ok(rows)
    }
}
