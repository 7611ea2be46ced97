//! # pivotbook-engine
//!
//! Aggregation pipeline turning raw records into a [`PivotTable`].
//!
//! This crate provides:
//! - Record normalization with per-record fallbacks
//! - Time bucketing relative to a reporting year
//! - Case-insensitive single-pass grouping
//! - Plan vs. fact merging with lead-time shifted YTD windows
//! - Grand total reduction and pivot assembly
//!
//! Stages always run in the same order:
//!
//! ```text
//! normalize → bucket → aggregate → (merge) → grand total → assemble
//! ```
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use pivotbook_core::{DimensionField, GroupingSpec, RawRecord, TemporalSource, ViewSchema};
//! use pivotbook_engine::PivotBuilder;
//!
//! let view = ViewSchema::new("QTY")
//!     .dimension(DimensionField::new("LargeGroup"))
//!     .dimension(DimensionField::new("Market"))
//!     .temporal(TemporalSource::year_month("Year", "Month"));
//! let spec = GroupingSpec::new(view, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
//!
//! let records = vec![
//!     RawRecord::new().with("LargeGroup", "A").with("Market", "Russia")
//!         .with("QTY", 10).with("Year", 2024).with("Month", 1),
//! ];
//! let outcome = PivotBuilder::new(&spec).build(&records).unwrap();
//! assert_eq!(outcome.table.rows.len(), 1);
//! ```

use pivotbook_core::{
    AggregateRow, BucketLayout, BucketedRecord, GroupingSpec, MalformedRecord, PivotError,
    PivotTable, RawRecord,
};

pub mod aggregate;
pub mod assemble;
pub mod bucket;
pub mod normalize;
pub mod planfact;
pub mod total;

pub use aggregate::GroupAggregator;
pub use assemble::PivotAssembler;
pub use bucket::{parse_date, TimeBucketAssigner};
pub use normalize::{NormalizationReport, RecordNormalizer};
pub use planfact::PlanFactMerger;
pub use total::GrandTotalReducer;

/// Aggregated rows of one record set, before assembly
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub layout: BucketLayout,
    /// First-seen order
    pub rows: Vec<AggregateRow>,
    pub grand_total: AggregateRow,
    pub issues: Vec<MalformedRecord>,
}

/// Assembled pivot plus the record anomalies absorbed while building it
#[derive(Debug, Clone)]
pub struct PivotOutcome {
    pub table: PivotTable,
    pub issues: Vec<MalformedRecord>,
}

/// Runs the aggregation stages for one grouping spec
pub struct PivotBuilder<'a> {
    spec: &'a GroupingSpec,
}

impl<'a> PivotBuilder<'a> {
    pub fn new(spec: &'a GroupingSpec) -> Self {
        Self { spec }
    }

    /// Normalize, bucket and aggregate one record set
    pub fn aggregate(&self, records: &[RawRecord]) -> Result<Aggregation, PivotError> {
        self.spec.validate()?;
        let mut issues = Vec::new();
        let bucketed = self.bucketize(records, &self.spec.view.measure, &mut issues);
        let layout = BucketLayout::from_buckets(
            self.spec.reporting_year(),
            bucketed.iter().map(|r| &r.bucket),
        );
        let rows = GroupAggregator::new(&layout).aggregate(&bucketed)?;
        let grand_total = GrandTotalReducer::reduce(&layout, &rows);
        Ok(Aggregation {
            layout,
            rows,
            grand_total,
            issues,
        })
    }

    /// Bucketed single-measure pivot
    pub fn build(&self, records: &[RawRecord]) -> Result<PivotOutcome, PivotError> {
        let aggregation = self.aggregate(records)?;
        let table = PivotAssembler::new(self.spec).assemble_buckets(
            &aggregation.layout,
            aggregation.rows,
            aggregation.grand_total,
        )?;
        Ok(PivotOutcome {
            table,
            issues: aggregation.issues,
        })
    }

    /// Plan vs. fact pivot over the months of the reporting year
    pub fn build_plan_fact(
        &self,
        plan: &[RawRecord],
        fact: &[RawRecord],
    ) -> Result<PivotOutcome, PivotError> {
        self.spec.validate()?;
        let mut issues = Vec::new();
        let plan = self.bucketize(plan, &self.spec.view.measure, &mut issues);
        let fact = self.bucketize(fact, self.spec.fact_measure_field(), &mut issues);

        // One layout for both sides
        let layout = BucketLayout::from_buckets(
            self.spec.reporting_year(),
            plan.iter().chain(&fact).map(|r| &r.bucket),
        );
        let aggregator = GroupAggregator::new(&layout);
        let plan = aggregator.aggregate(&plan)?;
        let fact = aggregator.aggregate(&fact)?;

        let merger = PlanFactMerger::new(
            self.spec.reporting_year(),
            self.spec.reference_date,
            self.spec.plan_fact.lead_time_months,
        );
        tracing::debug!(cutoff = %merger.ytd_cutoff(), "YTD window");
        let rows = merger.merge(&layout, &plan, &fact);
        let grand_total = GrandTotalReducer::reduce_plan_fact(&rows);
        let table = PivotAssembler::new(self.spec).assemble_plan_fact(rows, grand_total)?;

        Ok(PivotOutcome { table, issues })
    }

    fn bucketize(
        &self,
        records: &[RawRecord],
        measure: &str,
        issues: &mut Vec<MalformedRecord>,
    ) -> Vec<BucketedRecord> {
        let report = RecordNormalizer::new(&self.spec.view)
            .with_measure(measure)
            .normalize(records);
        let mut stage_issues = report.issues;
        let assigner = TimeBucketAssigner::new(self.spec.reporting_year(), self.spec.year_range);
        let bucketed = assigner.assign_all(report.records, &mut stage_issues);

        if !stage_issues.is_empty() {
            tracing::debug!(
                measure,
                records = records.len(),
                issues = stage_issues.len(),
                "absorbed malformed records"
            );
            for issue in &stage_issues {
                tracing::trace!(%issue);
            }
        }
        issues.append(&mut stage_issues);
        bucketed
    }
}
