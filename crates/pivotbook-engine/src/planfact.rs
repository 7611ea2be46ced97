//! Plan vs. fact merging
//!
//! Combines two independently aggregated row sets (planned and actual) over
//! the twelve months of the reporting year.
//!
//! # Algorithm
//!
//! 1. Union of group keys, plan keys first, then fact-only keys
//! 2. Per month: `diff = fact - plan`
//! 3. YTD cutoff = reference date + lead time (calendar months)
//! 4. A month is in the YTD window when the reporting year is before the
//!    cutoff year, or equal to it and the month is not after the cutoff month
//! 5. `total` sums all twelve months, `ytd` sums the months in the window
//!
//! Measures are exact decimals, so `diff == fact - plan` holds for every
//! month, the totals and the YTD subtotals without drift.

use chrono::{Datelike, Months, NaiveDate};
use pivotbook_core::{
    AggregateRow, BucketLayout, GroupKey, PlanFact, PlanFactRow, TimeBucket,
};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Merges plan and fact aggregates for one reporting year
#[derive(Debug, Clone, Copy)]
pub struct PlanFactMerger {
    reporting_year: i32,
    cutoff: NaiveDate,
}

impl PlanFactMerger {
    pub fn new(reporting_year: i32, reference_date: NaiveDate, lead_time_months: u32) -> Self {
        let cutoff = reference_date
            .checked_add_months(Months::new(lead_time_months))
            .unwrap_or(reference_date);
        Self {
            reporting_year,
            cutoff,
        }
    }

    /// Last date of the YTD window
    pub fn ytd_cutoff(&self) -> NaiveDate {
        self.cutoff
    }

    /// Whether a month (0-11) of the reporting year counts towards YTD
    pub fn includes(&self, month: u32) -> bool {
        match self.reporting_year.cmp(&self.cutoff.year()) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Equal => month < self.cutoff.month(),
            std::cmp::Ordering::Greater => false,
        }
    }

    /// Merge plan and fact rows aggregated over the same layout
    pub fn merge(
        &self,
        layout: &BucketLayout,
        plan: &[AggregateRow],
        fact: &[AggregateRow],
    ) -> Vec<PlanFactRow> {
        let mut index: HashMap<GroupKey, usize> = HashMap::new();
        let mut months: Vec<(GroupKey, [Decimal; 12], [Decimal; 12])> = Vec::new();

        for (side, rows) in [(Side::Plan, plan), (Side::Fact, fact)] {
            for row in rows {
                let pos = *index.entry(row.key.clone()).or_insert_with(|| {
                    months.push((row.key.clone(), [Decimal::ZERO; 12], [Decimal::ZERO; 12]));
                    months.len() - 1
                });
                let values = self.month_values(layout, row, side);
                let slot = match side {
                    Side::Plan => &mut months[pos].1,
                    Side::Fact => &mut months[pos].2,
                };
                for (acc, value) in slot.iter_mut().zip(values) {
                    *acc += value;
                }
            }
        }

        months
            .into_iter()
            .map(|(key, plan, fact)| self.build_row(key, &plan, &fact))
            .collect()
    }

    fn build_row(&self, key: GroupKey, plan: &[Decimal; 12], fact: &[Decimal; 12]) -> PlanFactRow {
        let mut row = PlanFactRow::zeroed(key);
        for (month, slot) in (0u32..).zip(row.months.iter_mut()) {
            let m = month as usize;
            *slot = PlanFact::new(plan[m], fact[m]);
            row.total += *slot;
            if self.includes(month) {
                row.ytd += *slot;
            }
        }
        row
    }

    fn month_values(&self, layout: &BucketLayout, row: &AggregateRow, side: Side) -> [Decimal; 12] {
        let mut values = [Decimal::ZERO; 12];
        let mut in_window = Decimal::ZERO;
        for month in 0..12u32 {
            if let Some(value) = layout
                .position(&TimeBucket::CurrentYearMonth(month))
                .and_then(|pos| row.buckets.get(pos))
            {
                values[month as usize] = *value;
                in_window += *value;
            }
        }
        let outside = row.total - in_window;
        if !outside.is_zero() {
            tracing::warn!(
                key = %row.key,
                side = side.as_str(),
                %outside,
                year = self.reporting_year,
                "values outside the reporting year are not part of plan/fact"
            );
        }
        values
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Plan,
    Fact,
}

impl Side {
    fn as_str(self) -> &'static str {
        match self {
            Side::Plan => "plan",
            Side::Fact => "fact",
        }
    }
}
