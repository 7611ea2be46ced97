//! Pivot assembly
//!
//! Orders aggregated rows, derives column metadata and packages the result
//! as a format-agnostic [`PivotTable`].
//!
//! Column order: hidden key columns (one per dimension), summary columns,
//! then one column (or plan/fact/diff triplet) per bucket in canonical order.
//! Rows are sorted descending by the first measure column with a stable sort,
//! so ties keep first-seen order. The grand total is never sorted.

use pivotbook_core::{
    AggregateRow, BucketLayout, ColumnSpec, GroupingSpec, PivotError, PivotRow, PivotTable,
    PlanFact, PlanFactRow, ValuePolicy, MONTH_LABELS, NO_DATE_COLUMN, TOTAL_COLUMN,
};
use rust_decimal::Decimal;

pub struct PivotAssembler<'a> {
    spec: &'a GroupingSpec,
}

impl<'a> PivotAssembler<'a> {
    pub fn new(spec: &'a GroupingSpec) -> Self {
        Self { spec }
    }

    /// Assemble a bucketed single-measure pivot, sorted by `total`
    pub fn assemble_buckets(
        &self,
        layout: &BucketLayout,
        rows: Vec<AggregateRow>,
        grand_total: AggregateRow,
    ) -> Result<PivotTable, PivotError> {
        if rows.is_empty() {
            return Err(PivotError::EmptyResult);
        }
        let labels = &self.spec.labels;

        let mut columns = self.key_columns();
        columns.push(ColumnSpec::measure(TOTAL_COLUMN, &labels.total).policy(ValuePolicy::Emphasis));
        columns.push(ColumnSpec::measure(NO_DATE_COLUMN, &labels.no_date));
        columns.extend(
            layout
                .buckets()
                .iter()
                .map(|b| ColumnSpec::measure(b.column_id(), b.label())),
        );

        let rows = rows
            .into_iter()
            .map(|row| bucket_row(row.key.labels().to_vec(), &row))
            .collect();
        let grand_total = bucket_row(Vec::new(), &grand_total);

        Ok(self.package(columns, rows, grand_total))
    }

    /// Assemble a plan/fact pivot, sorted by `total_plan`
    pub fn assemble_plan_fact(
        &self,
        rows: Vec<PlanFactRow>,
        grand_total: PlanFactRow,
    ) -> Result<PivotTable, PivotError> {
        if rows.is_empty() {
            return Err(PivotError::EmptyResult);
        }
        let labels = &self.spec.labels;

        let mut columns = self.key_columns();
        columns.extend(self.triplet_columns("total", &labels.total, ValuePolicy::Emphasis));
        columns.extend(self.triplet_columns("ytd", &labels.ytd, ValuePolicy::Plain));
        for (month, label) in MONTH_LABELS.iter().enumerate() {
            columns.extend(self.triplet_columns(&format!("month_{month}"), label, ValuePolicy::Plain));
        }

        let rows = rows
            .into_iter()
            .map(|row| plan_fact_row(row.key.labels().to_vec(), &row))
            .collect();
        let grand_total = plan_fact_row(Vec::new(), &grand_total);

        Ok(self.package(columns, rows, grand_total))
    }

    fn package(
        &self,
        columns: Vec<ColumnSpec>,
        mut rows: Vec<PivotRow>,
        grand_total: PivotRow,
    ) -> PivotTable {
        // `sort_by` is stable
        rows.sort_by(|a, b| primary(b).cmp(&primary(a)));
        PivotTable {
            columns,
            rows,
            grand_total,
            group_depth: self.spec.effective_group_depth(),
        }
    }

    fn key_columns(&self) -> Vec<ColumnSpec> {
        self.spec
            .view
            .dimensions
            .iter()
            .enumerate()
            .map(|(level, dim)| ColumnSpec::key(dim.field.clone(), dim.display_label(), level))
            .collect()
    }

    fn triplet_columns(
        &self,
        prefix: &str,
        group: &str,
        emphasis: ValuePolicy,
    ) -> [ColumnSpec; 3] {
        let labels = &self.spec.labels;
        [
            ColumnSpec::measure(format!("{prefix}_plan"), &labels.plan)
                .policy(emphasis)
                .in_group(group),
            ColumnSpec::measure(format!("{prefix}_fact"), &labels.fact)
                .policy(emphasis)
                .in_group(group),
            ColumnSpec::measure(format!("{prefix}_diff"), &labels.diff)
                .policy(ValuePolicy::Diff)
                .in_group(group),
        ]
    }
}

fn primary(row: &PivotRow) -> Decimal {
    row.values.first().copied().unwrap_or_default()
}

fn bucket_row(labels: Vec<String>, row: &AggregateRow) -> PivotRow {
    let mut values = Vec::with_capacity(row.buckets.len() + 2);
    values.push(row.total);
    values.push(row.no_date);
    values.extend_from_slice(&row.buckets);
    PivotRow { labels, values }
}

fn plan_fact_row(labels: Vec<String>, row: &PlanFactRow) -> PivotRow {
    let triplets = [row.total, row.ytd].into_iter().chain(row.months);
    let values = triplets
        .flat_map(|PlanFact { plan, fact, diff }| [plan, fact, diff])
        .collect();
    PivotRow { labels, values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GrandTotalReducer;
    use chrono::NaiveDate;
    use pivotbook_core::{DimensionField, GroupKey, TemporalSource, TimeBucket, ViewSchema};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn spec() -> GroupingSpec {
        let view = ViewSchema::new("QTY")
            .dimension(DimensionField::new("LargeGroup").label("Large Group"))
            .dimension(DimensionField::new("Market"))
            .temporal(TemporalSource::year_month("Year", "Month"));
        GroupingSpec::new(view, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
    }

    fn agg(layout: &BucketLayout, labels: &[&str], total: Decimal) -> AggregateRow {
        let key = GroupKey::new(labels.iter().map(|s| s.to_string()).collect());
        let mut row = AggregateRow::zeroed(key, layout);
        row.buckets[0] = total;
        row.total = total;
        row
    }

    #[test]
    fn bucket_columns_in_canonical_order() {
        let spec = spec();
        let layout = BucketLayout::from_buckets(2024, &[TimeBucket::PastYear(2023)]);
        let rows = vec![agg(&layout, &["A", "Russia"], dec!(1))];
        let total = rows[0].clone();
        let pivot = PivotAssembler::new(&spec)
            .assemble_buckets(&layout, rows, total)
            .unwrap();

        let ids: Vec<&str> = pivot.columns.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(&ids[..5], &["LargeGroup", "Market", "total", "no_date", "year_2023"]);
        assert_eq!(ids[5], "month_0");
        assert_eq!(pivot.columns.len(), 2 + 2 + 13);
        assert_eq!(pivot.columns[0].label, "Large Group");
        assert_eq!(pivot.columns[3].label, "Non-date");
        assert_eq!(pivot.columns[5].label, "Jan");
        assert_eq!(pivot.group_depth, 1);
        assert_eq!(pivot.rows[0].values.len(), pivot.measure_columns().count());
    }

    #[test]
    fn rows_sort_descending_and_stable() {
        let spec = spec();
        let layout = BucketLayout::months(2024);
        let rows = vec![
            agg(&layout, &["A", "first"], dec!(5)),
            agg(&layout, &["A", "big"], dec!(50)),
            agg(&layout, &["B", "second"], dec!(5)),
            agg(&layout, &["B", "small"], dec!(1)),
        ];
        let total = GrandTotalReducer::reduce(&layout, &rows);
        let pivot = PivotAssembler::new(&spec)
            .assemble_buckets(&layout, rows, total)
            .unwrap();

        let order: Vec<&str> = pivot.rows.iter().map(|r| r.labels[1].as_str()).collect();
        assert_eq!(order, vec!["big", "first", "second", "small"]);
        assert_eq!(pivot.value(&pivot.grand_total, TOTAL_COLUMN), Some(dec!(61)));
        assert!(pivot.grand_total.labels.is_empty());
    }

    #[test]
    fn empty_rows_are_refused() {
        let spec = spec();
        let layout = BucketLayout::months(2024);
        let total = AggregateRow::zeroed(GroupKey::grand_total(), &layout);
        let err = PivotAssembler::new(&spec)
            .assemble_buckets(&layout, vec![], total)
            .unwrap_err();
        assert!(matches!(err, PivotError::EmptyResult));
    }

    #[test]
    fn plan_fact_columns_are_grouped_triplets() {
        let spec = spec().plan_vs_fact(2, None);
        let mut row = PlanFactRow::zeroed(GroupKey::new(vec!["A".into(), "CIS".into()]));
        row.months[2] = PlanFact::new(dec!(4), dec!(6));
        row.total = row.months[2];
        let total = row.clone();
        let pivot = PivotAssembler::new(&spec)
            .assemble_plan_fact(vec![row], total)
            .unwrap();

        assert_eq!(pivot.columns.len(), 2 + 3 * 14);
        assert!(pivot.has_column_groups());
        let c = &pivot.columns[2];
        assert_eq!((c.id.as_str(), c.label.as_str()), ("total_plan", "Plan"));
        assert_eq!(c.group.as_deref(), Some("Total"));
        assert_eq!(pivot.columns[4].policy, ValuePolicy::Diff);
        assert_eq!(pivot.columns[5].group.as_deref(), Some("YTD"));
        assert_eq!(pivot.columns[8].id, "month_0_plan");
        assert_eq!(pivot.columns[8].group.as_deref(), Some("Jan"));

        let r = &pivot.rows[0];
        assert_eq!(pivot.value(r, "month_2_diff"), Some(dec!(2)));
        assert_eq!(pivot.value(r, "total_fact"), Some(dec!(6)));
        assert_eq!(pivot.value(r, "ytd_plan"), Some(dec!(0)));
    }
}
