//! View configuration
//!
//! A view names the dimension, measure and temporal fields of one report, how
//! it is grouped, and how it is styled when exported. Everything here is
//! plain serde data so hosts can load it from TOML or JSON.
//!
//! # Example
//!
//! ```toml
//! kind = "buckets"
//! group_depth = 1
//!
//! [export]
//! name = "remaining_to_produce"
//!
//! [view]
//! measure = "RemainingToProduce_QTY"
//! temporal = { kind = "date", field = "AggregatedShipmentDate" }
//!
//! [[view.dimensions]]
//! field = "LargeGroup"
//! label = "Large Group"
//!
//! [[view.dimensions]]
//! field = "GroupName"
//! label = "Group"
//! ```

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::table::TableConfig;
use crate::workbook::Rgb;
use crate::{FieldName, PivotError};

/// Placeholder used for missing dimension values when a field defines none
pub const DEFAULT_PLACEHOLDER: &str = "Unspecified";

// ============================================================================
// View Schema
// ============================================================================

/// A grouping dimension of a view
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionField {
    pub field: FieldName,
    /// Header label; defaults to the field name
    #[serde(default)]
    pub label: Option<String>,
    /// Substitute for null/blank values; defaults to `Unspecified`
    #[serde(default)]
    pub placeholder: Option<String>,
}

impl DimensionField {
    pub fn new(field: impl Into<FieldName>) -> Self {
        Self {
            field: field.into(),
            label: None,
            placeholder: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.field)
    }

    pub fn placeholder_text(&self) -> &str {
        self.placeholder.as_deref().unwrap_or(DEFAULT_PLACEHOLDER)
    }
}

/// Where a view's temporal information lives
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemporalSource {
    /// The view has no time axis; every record is `NoDate`
    #[default]
    Absent,
    /// Integer year and 1-based month fields
    YearMonth {
        year_field: FieldName,
        month_field: FieldName,
    },
    /// A single date string (`DD.MM.YYYY` or ISO-like)
    Date { field: FieldName },
}

impl TemporalSource {
    pub fn year_month(year_field: impl Into<FieldName>, month_field: impl Into<FieldName>) -> Self {
        TemporalSource::YearMonth {
            year_field: year_field.into(),
            month_field: month_field.into(),
        }
    }

    pub fn date(field: impl Into<FieldName>) -> Self {
        TemporalSource::Date {
            field: field.into(),
        }
    }
}

/// Explicit per-view record schema
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSchema {
    /// Hierarchy order: the first dimension is the outermost group
    #[serde(default)]
    pub dimensions: Vec<DimensionField>,
    pub measure: FieldName,
    #[serde(default)]
    pub temporal: TemporalSource,
}

impl ViewSchema {
    pub fn new(measure: impl Into<FieldName>) -> Self {
        Self {
            dimensions: Vec::new(),
            measure: measure.into(),
            temporal: TemporalSource::Absent,
        }
    }

    pub fn dimension(mut self, dimension: DimensionField) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn temporal(mut self, temporal: TemporalSource) -> Self {
        self.temporal = temporal;
        self
    }

    pub fn validate(&self) -> Result<(), PivotError> {
        if self.dimensions.is_empty() {
            return Err(PivotError::InvalidSchema(
                "at least one dimension is required".into(),
            ));
        }
        if self.measure.trim().is_empty() {
            return Err(PivotError::InvalidSchema("measure field is empty".into()));
        }
        for (i, dim) in self.dimensions.iter().enumerate() {
            if dim.field.trim().is_empty() {
                return Err(PivotError::InvalidSchema(format!(
                    "dimension {i} has an empty field name"
                )));
            }
            if self.dimensions[..i].iter().any(|d| d.field == dim.field) {
                return Err(PivotError::InvalidSchema(format!(
                    "dimension '{}' is listed twice",
                    dim.field
                )));
            }
        }
        match &self.temporal {
            TemporalSource::YearMonth {
                year_field,
                month_field,
            } if year_field.trim().is_empty() || month_field.trim().is_empty() => Err(
                PivotError::InvalidSchema("year/month field names must not be empty".into()),
            ),
            TemporalSource::Date { field } if field.trim().is_empty() => Err(
                PivotError::InvalidSchema("date field name must not be empty".into()),
            ),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Grouping
// ============================================================================

/// Accepted calendar years; anything outside is treated as unparseable
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl YearRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, year: i64) -> bool {
        i64::from(self.min) <= year && year <= i64::from(self.max)
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            min: 1901,
            max: 2099,
        }
    }
}

/// Which pivot a view produces
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    /// One measure bucketed into past years, months and future years
    #[default]
    Buckets,
    /// Planned vs. actual per month with YTD subtotals
    PlanFact,
}

/// Settings that only apply to plan/fact views
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanFactOptions {
    /// Months added to the reference date to find the YTD cutoff (0-12)
    pub lead_time_months: u32,
    /// Year whose months are compared; defaults to the reference date's year
    pub reporting_year: Option<i32>,
    /// Measure field of the fact records; defaults to the view measure
    pub fact_measure: Option<FieldName>,
}

/// Header labels of generated measure columns
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnLabels {
    pub total: String,
    pub no_date: String,
    pub ytd: String,
    pub plan: String,
    pub fact: String,
    pub diff: String,
}

impl Default for ColumnLabels {
    fn default() -> Self {
        Self {
            total: "Total".into(),
            no_date: "Non-date".into(),
            ytd: "YTD".into(),
            plan: "Plan".into(),
            fact: "Fact".into(),
            diff: "Diff".into(),
        }
    }
}

/// Everything the aggregation pipeline needs to turn records into a pivot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingSpec {
    pub view: ViewSchema,
    #[serde(default)]
    pub kind: ViewKind,
    #[serde(default)]
    pub plan_fact: PlanFactOptions,
    /// Leading dimensions rendered as group levels; defaults to all but the last
    #[serde(default)]
    pub group_depth: Option<usize>,
    #[serde(default)]
    pub year_range: YearRange,
    #[serde(default)]
    pub labels: ColumnLabels,
    /// "Today" for bucketing and YTD purposes
    pub reference_date: NaiveDate,
}

impl GroupingSpec {
    pub fn new(view: ViewSchema, reference_date: NaiveDate) -> Self {
        Self {
            view,
            kind: ViewKind::Buckets,
            plan_fact: PlanFactOptions::default(),
            group_depth: None,
            year_range: YearRange::default(),
            labels: ColumnLabels::default(),
            reference_date,
        }
    }

    /// Switch to a plan/fact view
    pub fn plan_vs_fact(mut self, lead_time_months: u32, reporting_year: Option<i32>) -> Self {
        self.kind = ViewKind::PlanFact;
        self.plan_fact.lead_time_months = lead_time_months;
        self.plan_fact.reporting_year = reporting_year;
        self
    }

    pub fn fact_measure(mut self, field: impl Into<FieldName>) -> Self {
        self.plan_fact.fact_measure = Some(field.into());
        self
    }

    pub fn group_depth(mut self, depth: usize) -> Self {
        self.group_depth = Some(depth);
        self
    }

    pub fn year_range(mut self, range: YearRange) -> Self {
        self.year_range = range;
        self
    }

    pub fn labels(mut self, labels: ColumnLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Group levels actually rendered; the last dimension always stays a leaf label
    pub fn effective_group_depth(&self) -> usize {
        let max = self.view.dimensions.len().saturating_sub(1);
        self.group_depth.map_or(max, |d| d.min(max))
    }

    /// Year whose months become month buckets
    pub fn reporting_year(&self) -> i32 {
        match self.kind {
            ViewKind::PlanFact => self
                .plan_fact
                .reporting_year
                .unwrap_or_else(|| self.reference_date.year()),
            ViewKind::Buckets => self.reference_date.year(),
        }
    }

    pub fn fact_measure_field(&self) -> &str {
        self.plan_fact
            .fact_measure
            .as_deref()
            .unwrap_or(&self.view.measure)
    }

    pub fn validate(&self) -> Result<(), PivotError> {
        self.view.validate()?;
        if self.plan_fact.lead_time_months > 12 {
            return Err(PivotError::InvalidSchema(format!(
                "lead_time_months must be within 0-12, got {}",
                self.plan_fact.lead_time_months
            )));
        }
        if self.year_range.min > self.year_range.max {
            return Err(PivotError::InvalidSchema(format!(
                "year range {}..={} is empty",
                self.year_range.min, self.year_range.max
            )));
        }
        if let Some(depth) = self.group_depth {
            if depth >= self.view.dimensions.len() {
                return Err(PivotError::InvalidSchema(format!(
                    "group_depth {depth} leaves no leaf dimension ({} dimensions)",
                    self.view.dimensions.len()
                )));
            }
        }
        if let Some(field) = &self.plan_fact.fact_measure {
            if field.trim().is_empty() {
                return Err(PivotError::InvalidSchema("fact_measure is empty".into()));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Styling and Output
// ============================================================================

/// Visual policy of generated workbooks
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleOptions {
    pub grouped_sheet: bool,
    pub flat_sheet: bool,
    pub grouped_sheet_name: String,
    pub flat_sheet_name: String,
    /// Header of the grouped sheet's label column
    pub group_header: String,
    pub grand_total_label: String,
    pub flat_total_label: String,
    pub header_fill: Rgb,
    pub header_font: Rgb,
    pub total_fill: Rgb,
    /// Fill per group depth; deeper levels reuse the last entry
    pub group_fills: Vec<Rgb>,
    /// Group levels shallower than this are bold
    pub bold_group_levels: usize,
    pub positive_color: Rgb,
    pub negative_color: Rgb,
    pub number_format: String,
    pub diff_number_format: String,
    pub label_width: f64,
    pub key_width: f64,
    pub measure_width: f64,
    pub freeze_header: bool,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            grouped_sheet: true,
            flat_sheet: true,
            grouped_sheet_name: "Grouped".into(),
            flat_sheet_name: "Flat".into(),
            group_header: "Group".into(),
            grand_total_label: "Grand Total".into(),
            flat_total_label: "TOTAL".into(),
            header_fill: Rgb(0x002060),
            header_font: Rgb(0xFFFFFF),
            total_fill: Rgb(0xFFF2CC),
            group_fills: vec![Rgb(0xD9E1F2), Rgb(0xE9EDF5), Rgb(0xF2F4F8)],
            bold_group_levels: 2,
            positive_color: Rgb(0x16A34A),
            negative_color: Rgb(0xDC2626),
            number_format: "#,##0".into(),
            diff_number_format: "+#,##0;-#,##0".into(),
            label_width: 35.0,
            key_width: 22.0,
            measure_width: 12.0,
            freeze_header: true,
        }
    }
}

impl StyleOptions {
    pub fn group_fill(&self, depth: usize) -> Option<Rgb> {
        self.group_fills
            .get(depth)
            .or_else(|| self.group_fills.last())
            .copied()
    }
}

/// Logical export name and optional version, e.g. `sale_plan_v12.xlsx`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportName {
    pub name: String,
    #[serde(default)]
    pub version: Option<u32>,
}

impl ExportName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn file_name(&self) -> String {
        let name = self.name.trim();
        let name = if name.is_empty() { "table" } else { name };
        match self.version {
            Some(v) => format!("{name}_v{v}.xlsx"),
            None => format!("{name}.xlsx"),
        }
    }
}

impl Default for ExportName {
    fn default() -> Self {
        Self::new("table")
    }
}

// ============================================================================
// View File
// ============================================================================

/// On-disk description of one export: either a pivot view or a plain table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    pub kind: ViewKind,
    #[serde(default)]
    pub group_depth: Option<usize>,
    #[serde(default)]
    pub reference_date: Option<NaiveDate>,
    #[serde(default)]
    pub export: ExportName,
    #[serde(default)]
    pub view: Option<ViewSchema>,
    #[serde(default)]
    pub plan_fact: PlanFactOptions,
    #[serde(default)]
    pub year_range: YearRange,
    #[serde(default)]
    pub labels: ColumnLabels,
    #[serde(default)]
    pub style: StyleOptions,
    #[serde(default)]
    pub table: Option<TableConfig>,
}

impl ViewConfig {
    /// Grouping spec for a pivot view; `fallback_date` is used when the file
    /// does not pin a reference date
    pub fn grouping(&self, fallback_date: NaiveDate) -> Result<GroupingSpec, PivotError> {
        let view = self.view.clone().ok_or_else(|| {
            PivotError::InvalidSchema("view file has no [view] section".into())
        })?;
        let spec = GroupingSpec {
            view,
            kind: self.kind,
            plan_fact: self.plan_fact.clone(),
            group_depth: self.group_depth,
            year_range: self.year_range,
            labels: self.labels.clone(),
            reference_date: self.reference_date.unwrap_or(fallback_date),
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), PivotError> {
        match (&self.view, &self.table) {
            (Some(_), Some(_)) => Err(PivotError::InvalidSchema(
                "a view file describes either a [view] or a [table], not both".into(),
            )),
            (None, None) => Err(PivotError::InvalidSchema(
                "a view file needs a [view] or a [table] section".into(),
            )),
            (None, Some(table)) => table.validate(),
            (Some(_), None) => self
                .grouping(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default())
                .map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn market_schema() -> ViewSchema {
        ViewSchema::new("QTY")
            .dimension(DimensionField::new("LargeGroup").label("Large Group"))
            .dimension(DimensionField::new("Market").placeholder("Unspecified market"))
            .temporal(TemporalSource::year_month("Year", "Month"))
    }

    #[test]
    fn dimension_defaults() {
        let dim = DimensionField::new("Market");
        assert_eq!(dim.display_label(), "Market");
        assert_eq!(dim.placeholder_text(), DEFAULT_PLACEHOLDER);
    }

    #[test]
    fn schema_requires_dimensions() {
        let err = ViewSchema::new("QTY").validate().unwrap_err();
        assert!(err.to_string().contains("at least one dimension"));
    }

    #[test]
    fn schema_rejects_duplicate_dimension() {
        let schema = ViewSchema::new("QTY")
            .dimension(DimensionField::new("Market"))
            .dimension(DimensionField::new("Market"));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn group_depth_defaults_to_all_but_last() {
        let spec = GroupingSpec::new(market_schema(), date(2024, 9, 15));
        assert_eq!(spec.effective_group_depth(), 1);
        assert_eq!(spec.clone().group_depth(0).effective_group_depth(), 0);
        assert!(spec.group_depth(2).validate().is_err());
    }

    #[test]
    fn lead_time_is_bounded() {
        let spec = GroupingSpec::new(market_schema(), date(2024, 9, 15)).plan_vs_fact(13, None);
        assert!(spec.validate().is_err());
        let spec = GroupingSpec::new(market_schema(), date(2024, 9, 15)).plan_vs_fact(12, None);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn reporting_year_follows_kind() {
        let spec = GroupingSpec::new(market_schema(), date(2024, 9, 15));
        assert_eq!(spec.reporting_year(), 2024);
        let spec = spec.plan_vs_fact(2, Some(2023));
        assert_eq!(spec.reporting_year(), 2023);
        assert_eq!(spec.fact_measure_field(), "QTY");
    }

    #[test]
    fn year_range_bounds_are_inclusive() {
        let range = YearRange::default();
        assert!(range.contains(1901));
        assert!(range.contains(2099));
        assert!(!range.contains(1900));
        assert!(!range.contains(2100));
    }

    #[test]
    fn export_file_names() {
        assert_eq!(ExportName::new("table").file_name(), "table.xlsx");
        assert_eq!(
            ExportName::new("sale_plan").version(12).file_name(),
            "sale_plan_v12.xlsx"
        );
        assert_eq!(ExportName::new("  ").file_name(), "table.xlsx");
    }

    #[test]
    fn group_fill_reuses_last_entry() {
        let style = StyleOptions::default();
        assert_eq!(style.group_fill(0), Some(Rgb(0xD9E1F2)));
        assert_eq!(style.group_fill(7), Some(Rgb(0xF2F4F8)));
    }

    #[test]
    fn view_config_needs_exactly_one_section() {
        let config = ViewConfig {
            kind: ViewKind::Buckets,
            group_depth: None,
            reference_date: None,
            export: ExportName::default(),
            view: None,
            plan_fact: PlanFactOptions::default(),
            year_range: YearRange::default(),
            labels: ColumnLabels::default(),
            style: StyleOptions::default(),
            table: None,
        };
        assert!(config.validate().is_err());

        let config = ViewConfig {
            view: Some(market_schema()),
            reference_date: Some(date(2024, 1, 1)),
            ..config
        };
        assert!(config.validate().is_ok());
        let spec = config.grouping(date(2030, 1, 1)).unwrap();
        assert_eq!(spec.reference_date, date(2024, 1, 1));
    }
}
