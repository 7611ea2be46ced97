//! Pivot data model
//!
//! Rows produced by the aggregation stages and the format-agnostic
//! `PivotTable` handed to renderers.
//!
//! # Row flow
//!
//! ```text
//! BucketedRecord ──► AggregateRow ──┐
//!                                   ├──► PivotRow (values aligned to measure columns)
//! (plan, fact) ───► PlanFactRow ────┘
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::AddAssign;

use crate::{ColumnId, GroupKey, TimeBucket};

/// Column id of the per-row total
pub const TOTAL_COLUMN: &str = "total";

/// Column id of the no-date accumulator
pub const NO_DATE_COLUMN: &str = "no_date";

/// Month header labels, January first
pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

// ============================================================================
// Bucket Layout
// ============================================================================

/// Canonical ordered list of dated bucket columns for one reporting window
///
/// Always holds the twelve months of the reporting year, plus every past and
/// future year seen in the data. `NoDate` is never part of the layout; it has
/// its own accumulator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketLayout {
    reporting_year: i32,
    buckets: Vec<TimeBucket>,
}

impl BucketLayout {
    /// Layout with only the twelve months of the reporting year
    pub fn months(reporting_year: i32) -> Self {
        Self {
            reporting_year,
            buckets: (0..12).map(TimeBucket::CurrentYearMonth).collect(),
        }
    }

    /// Layout covering every year bucket that occurs in `seen`
    pub fn from_buckets<'a>(
        reporting_year: i32,
        seen: impl IntoIterator<Item = &'a TimeBucket>,
    ) -> Self {
        let mut layout = Self::months(reporting_year);
        for bucket in seen {
            if matches!(bucket, TimeBucket::PastYear(_) | TimeBucket::FutureYear(_))
                && layout.position(bucket).is_none()
            {
                layout.buckets.push(*bucket);
                layout.buckets.sort();
            }
        }
        layout
    }

    pub fn reporting_year(&self) -> i32 {
        self.reporting_year
    }

    pub fn buckets(&self) -> &[TimeBucket] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Index of a bucket column, `None` for `NoDate` or unknown years
    pub fn position(&self, bucket: &TimeBucket) -> Option<usize> {
        self.buckets.binary_search(bucket).ok()
    }

    /// Index of the column with the given id
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.buckets.iter().position(|b| b.column_id() == id)
    }

    pub fn column_ids(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.buckets.iter().map(TimeBucket::column_id)
    }
}

// ============================================================================
// Aggregate Rows
// ============================================================================

/// One row per distinct group key, holding summed measures per bucket
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub key: GroupKey,
    /// One value per layout bucket, in layout order; never sparse
    pub buckets: Vec<Decimal>,
    pub no_date: Decimal,
    /// Sum of all bucket values plus `no_date`
    pub total: Decimal,
}

impl AggregateRow {
    /// Row with every bucket initialized to zero
    pub fn zeroed(key: GroupKey, layout: &BucketLayout) -> Self {
        Self {
            key,
            buckets: vec![Decimal::ZERO; layout.len()],
            no_date: Decimal::ZERO,
            total: Decimal::ZERO,
        }
    }

    /// Value of a bucket column by id
    pub fn value(&self, layout: &BucketLayout, id: &str) -> Option<Decimal> {
        if id == NO_DATE_COLUMN {
            return Some(self.no_date);
        }
        if id == TOTAL_COLUMN {
            return Some(self.total);
        }
        layout
            .position_of(id)
            .and_then(|pos| self.buckets.get(pos).copied())
    }

    /// Sum of the dated buckets, excluding `no_date`
    pub fn bucket_sum(&self) -> Decimal {
        self.buckets.iter().copied().sum()
    }
}

impl AddAssign<&AggregateRow> for AggregateRow {
    fn add_assign(&mut self, rhs: &AggregateRow) {
        debug_assert_eq!(self.buckets.len(), rhs.buckets.len());
        for (acc, value) in self.buckets.iter_mut().zip(&rhs.buckets) {
            *acc += *value;
        }
        self.no_date += rhs.no_date;
        self.total += rhs.total;
    }
}

// ============================================================================
// Plan / Fact Rows
// ============================================================================

/// Planned vs. actual triplet; `diff` is always `fact - plan`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFact {
    pub plan: Decimal,
    pub fact: Decimal,
    pub diff: Decimal,
}

impl PlanFact {
    pub fn new(plan: Decimal, fact: Decimal) -> Self {
        Self {
            plan,
            fact,
            diff: fact - plan,
        }
    }
}

impl AddAssign for PlanFact {
    fn add_assign(&mut self, rhs: PlanFact) {
        self.plan += rhs.plan;
        self.fact += rhs.fact;
        self.diff += rhs.diff;
    }
}

impl std::iter::Sum for PlanFact {
    fn sum<I: Iterator<Item = PlanFact>>(iter: I) -> Self {
        iter.fold(PlanFact::default(), |mut acc, pf| {
            acc += pf;
            acc
        })
    }
}

/// Merged plan/fact row for one group key
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanFactRow {
    pub key: GroupKey,
    /// January first
    pub months: [PlanFact; 12],
    /// Sum over all twelve months
    pub total: PlanFact,
    /// Sum over the months inside the year-to-date window
    pub ytd: PlanFact,
}

impl PlanFactRow {
    pub fn zeroed(key: GroupKey) -> Self {
        Self {
            key,
            months: [PlanFact::default(); 12],
            total: PlanFact::default(),
            ytd: PlanFact::default(),
        }
    }
}

impl AddAssign<&PlanFactRow> for PlanFactRow {
    fn add_assign(&mut self, rhs: &PlanFactRow) {
        for (acc, month) in self.months.iter_mut().zip(rhs.months) {
            *acc += month;
        }
        self.total += rhs.total;
        self.ytd += rhs.ytd;
    }
}

// ============================================================================
// Pivot Table
// ============================================================================

/// Whether a column is part of the hierarchy or a visible measure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    /// Hidden grouping key; `level` is the position in the hierarchy
    GroupKey { level: usize },
    Measure,
}

/// Formatting/colouring policy of a measure column
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuePolicy {
    #[default]
    Plain,
    /// Summary measure shown in bold
    Emphasis,
    /// Signed difference, coloured by sign
    Diff,
}

/// Column metadata of a pivot table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub id: ColumnId,
    pub label: String,
    pub role: ColumnRole,
    pub policy: ValuePolicy,
    /// Super-header this column sits under (e.g. `YTD`, `Jan`)
    pub group: Option<String>,
}

impl ColumnSpec {
    pub fn key(id: impl Into<ColumnId>, label: impl Into<String>, level: usize) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            role: ColumnRole::GroupKey { level },
            policy: ValuePolicy::Plain,
            group: None,
        }
    }

    pub fn measure(id: impl Into<ColumnId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            role: ColumnRole::Measure,
            policy: ValuePolicy::Plain,
            group: None,
        }
    }

    pub fn policy(mut self, policy: ValuePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn is_key(&self) -> bool {
        matches!(self.role, ColumnRole::GroupKey { .. })
    }
}

/// One row of an assembled pivot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PivotRow {
    /// One label per key column
    pub labels: Vec<String>,
    /// One value per measure column
    pub values: Vec<Decimal>,
}

/// A line of the hierarchical outline of a pivot
#[derive(Clone, Debug, PartialEq)]
pub enum PivotLine<'a> {
    /// Subtree summary for one value of a grouping level
    Group {
        depth: usize,
        label: String,
        values: Vec<Decimal>,
    },
    Leaf {
        depth: usize,
        label: String,
        row: &'a PivotRow,
    },
}

/// Format-agnostic pivot: ordered columns, sorted rows and a pinned grand total
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PivotTable {
    /// Key columns first, then measure columns in display order
    pub columns: Vec<ColumnSpec>,
    /// Sorted descending by the primary measure
    pub rows: Vec<PivotRow>,
    /// Always rendered last; its labels are empty
    pub grand_total: PivotRow,
    /// Number of leading key columns rendered as collapsible group levels
    pub group_depth: usize,
}

impl PivotTable {
    pub fn key_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| c.is_key())
    }

    pub fn measure_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| !c.is_key())
    }

    pub fn has_column_groups(&self) -> bool {
        self.measure_columns().any(|c| c.group.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of a measure column in a row
    pub fn value(&self, row: &PivotRow, id: &str) -> Option<Decimal> {
        self.measure_columns()
            .position(|c| c.id == id)
            .and_then(|pos| row.values.get(pos).copied())
    }

    /// Hierarchical outline: a summary line above each group, then its leaves
    ///
    /// Groups appear in order of first appearance in `rows`; group labels are
    /// matched case-insensitively, like group keys.
    pub fn outline(&self) -> Vec<PivotLine<'_>> {
        let rows: Vec<&PivotRow> = self.rows.iter().collect();
        let mut lines = Vec::with_capacity(rows.len());
        let width = self.measure_columns().count();
        outline_level(&rows, 0, self.group_depth, width, &mut lines);
        lines
    }
}

fn outline_level<'a>(
    rows: &[&'a PivotRow],
    level: usize,
    depth: usize,
    width: usize,
    lines: &mut Vec<PivotLine<'a>>,
) {
    if level >= depth {
        for &row in rows {
            lines.push(PivotLine::Leaf {
                depth,
                label: row.labels.get(depth..).unwrap_or_default().join(" / "),
                row,
            });
        }
        return;
    }

    // First-appearance ordered partition of rows by the label at `level`
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<&'a PivotRow>)> = Vec::new();
    for &row in rows {
        let label = row.labels.get(level).cloned().unwrap_or_default();
        let folded = GroupKey::fold(&label);
        match index.get(&folded) {
            Some(&pos) => groups[pos].1.push(row),
            None => {
                index.insert(folded, groups.len());
                groups.push((label, vec![row]));
            }
        }
    }

    for (label, members) in groups {
        let mut values = vec![Decimal::ZERO; width];
        for row in &members {
            for (acc, value) in values.iter_mut().zip(&row.values) {
                *acc += *value;
            }
        }
        lines.push(PivotLine::Group {
            depth: level,
            label,
            values,
        });
        outline_level(&members, level + 1, depth, width, lines);
    }
}
