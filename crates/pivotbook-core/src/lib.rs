//! # pivotbook-core
//!
//! Core domain model and traits for the pivotbook aggregation and export engine.
//!
//! This crate provides:
//! - Record types: `RawRecord`, `NormalizedRecord`, `BucketedRecord`, `TimeBucket`, `GroupKey`
//! - Pivot types: `BucketLayout`, `AggregateRow`, `PlanFactRow`, `PivotTable`, `ColumnSpec`
//! - Workbook model: `Workbook`, `Sheet`, `Cell`, `CellStyle`
//! - View configuration: `ViewSchema`, `GroupingSpec`, `StyleOptions`
//! - Core traits: `Renderer`, `TableSource`
//! - Error types
//!
//! ## Example
//!
//! ```rust
//! use pivotbook_core::{DimensionField, RawRecord, TemporalSource, ViewSchema};
//!
//! let schema = ViewSchema::new("QTY")
//!     .dimension(DimensionField::new("LargeGroup").label("Large Group"))
//!     .dimension(DimensionField::new("Market"))
//!     .temporal(TemporalSource::year_month("Year", "Month"));
//!
//! let record = RawRecord::new()
//!     .with("Market", "Russia")
//!     .with("LargeGroup", "A")
//!     .with("QTY", 10)
//!     .with("Year", 2024)
//!     .with("Month", 1);
//!
//! assert!(schema.validate().is_ok());
//! assert_eq!(record.text("Market").as_deref(), Some("Russia"));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

pub mod pivot;
pub mod table;
pub mod view;
pub mod workbook;

pub use pivot::{
    AggregateRow, BucketLayout, ColumnRole, ColumnSpec, PivotLine, PivotRow, PivotTable, PlanFact,
    PlanFactRow, ValuePolicy, MONTH_LABELS, NO_DATE_COLUMN, TOTAL_COLUMN,
};
pub use table::{ColumnKind, RecordTable, TableColumn, TableConfig, TableSource};
pub use view::{
    ColumnLabels, DimensionField, ExportName, GroupingSpec, PlanFactOptions, StyleOptions,
    TemporalSource, ViewConfig, ViewKind, ViewSchema, YearRange, DEFAULT_PLACEHOLDER,
};
pub use workbook::{
    BorderWeight, Cell, CellStyle, CellValue, HAlign, MergedRange, Rgb, Sheet, ValueType, Workbook,
};

// ============================================================================
// Type Aliases
// ============================================================================

/// Name of a field in a raw record
pub type FieldName = String;

/// Identifier of a pivot column (`total`, `no_date`, `month_3`, `year_2024`, ...)
pub type ColumnId = String;

// ============================================================================
// Raw Records
// ============================================================================

/// A single scalar field value as delivered by the data source
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Text form of the value, trimmed. `None` for null or blank text.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(b) => Some(Cow::Owned(b.to_string())),
            Scalar::Number(n) => Some(Cow::Owned(n.to_string())),
            Scalar::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Cow::Borrowed(trimmed))
                }
            }
        }
    }

    /// Exact decimal value. Numeric text is accepted; anything else is `None`.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Scalar::Number(n) => Decimal::try_from(*n).ok(),
            Scalar::Text(s) => Decimal::from_str(s.trim()).ok(),
            Scalar::Null | Scalar::Bool(_) => None,
        }
    }

    /// Integral value. Fractional numbers and non-numeric text are `None`.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Scalar::Number(n) if n.is_finite() && n.fract() == 0.0 => Some(*n as i64),
            Scalar::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Number(f64::from(value))
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value as f64)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map_or(Scalar::Null, Into::into)
    }
}

/// One transactional fact: an opaque mapping of field name to scalar value
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<FieldName, Scalar>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter
    pub fn with(mut self, field: impl Into<FieldName>, value: impl Into<Scalar>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Scalar> {
        self.fields.get(field)
    }

    /// Trimmed text of a field, `None` when absent, null or blank
    pub fn text(&self, field: &str) -> Option<Cow<'_, str>> {
        self.get(field).and_then(Scalar::as_text)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<FieldName>, V: Into<Scalar>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ============================================================================
// Normalized Records
// ============================================================================

/// Temporal information extracted from a record, before parsing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemporalValue {
    /// Explicit year and 1-based month, taken as-is from integer fields
    YearMonth { year: i64, month: i64 },
    /// Date-like text still to be parsed
    DateText(String),
    /// No temporal field present
    Absent,
}

/// A record with trimmed, defaulted dimensions and a numeric measure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Dimension values in schema order
    pub dimensions: Vec<String>,
    pub measure: Decimal,
    pub temporal: TemporalValue,
}

/// Time column a record's measure is added to
///
/// The derived ordering is the canonical column order: past years ascending,
/// the twelve months of the reporting year, future years ascending, then no-date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeBucket {
    PastYear(i32),
    /// Month of the reporting year, 0-11
    CurrentYearMonth(u32),
    FutureYear(i32),
    NoDate,
}

impl TimeBucket {
    /// Stable column id for this bucket
    pub fn column_id(&self) -> ColumnId {
        match self {
            TimeBucket::PastYear(year) | TimeBucket::FutureYear(year) => format!("year_{year}"),
            TimeBucket::CurrentYearMonth(month) => format!("month_{month}"),
            TimeBucket::NoDate => NO_DATE_COLUMN.to_string(),
        }
    }

    /// Default header label
    pub fn label(&self) -> String {
        match self {
            TimeBucket::PastYear(year) | TimeBucket::FutureYear(year) => year.to_string(),
            TimeBucket::CurrentYearMonth(month) => MONTH_LABELS
                .get(*month as usize)
                .copied()
                .unwrap_or("?")
                .to_string(),
            TimeBucket::NoDate => "Non-date".to_string(),
        }
    }
}

impl std::fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.column_id())
    }
}

/// A normalized record annotated with its time bucket
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BucketedRecord {
    pub dimensions: Vec<String>,
    pub measure: Decimal,
    pub bucket: TimeBucket,
}

// ============================================================================
// Group Keys
// ============================================================================

/// Ordered tuple of dimension values identifying one pivot row
///
/// Equality and hashing ignore case and whitespace differences per component;
/// the labels keep the casing they were created with.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct GroupKey {
    labels: Vec<String>,
    folded: Vec<String>,
}

impl GroupKey {
    pub fn new(labels: Vec<String>) -> Self {
        let folded = labels.iter().map(|l| Self::fold(l)).collect();
        Self { labels, folded }
    }

    /// Key of the synthetic grand-total row
    pub fn grand_total() -> Self {
        Self::new(Vec::new())
    }

    /// Comparison form of one key component
    pub fn fold(component: &str) -> String {
        component
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// Display labels, first-seen casing
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl From<Vec<String>> for GroupKey {
    fn from(labels: Vec<String>) -> Self {
        Self::new(labels)
    }
}

impl From<GroupKey> for Vec<String> {
    fn from(key: GroupKey) -> Self {
        key.labels
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.labels.join(" | "))
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for workbook output backends
pub trait Renderer {
    type Output;

    fn render(&self, workbook: &Workbook) -> Result<Self::Output, RenderError>;
}

// ============================================================================
// Errors
// ============================================================================

/// A record-level data quality problem.
///
/// These are absorbed with defaults (zero measure, `NoDate` bucket) and only
/// reported; they never abort an aggregation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MalformedRecord {
    #[error("record {index}: measure '{field}' is not numeric ({value:?})")]
    NonNumericMeasure {
        index: usize,
        field: FieldName,
        value: String,
    },

    #[error("record {index}: measure '{field}' is outside +/-{limit} ({value})")]
    MeasureOutOfRange {
        index: usize,
        field: FieldName,
        value: String,
        limit: Decimal,
    },

    #[error("record {index}: period field '{field}' is not an integer ({value:?})")]
    NonIntegerPeriod {
        index: usize,
        field: FieldName,
        value: String,
    },

    #[error("record {index}: unparseable date {value:?}")]
    UnparseableDate { index: usize, value: String },

    #[error("record {index}: month {month} is outside 1-12")]
    InvalidMonth { index: usize, month: i64 },

    #[error("record {index}: year {year} is outside the accepted range")]
    YearOutOfRange { index: usize, year: i64 },
}

/// Aggregation and assembly error
#[derive(Debug, Error)]
pub enum PivotError {
    #[error("Nothing to export: no rows survived filtering and grouping")]
    EmptyResult,

    #[error("Invalid view schema: {0}")]
    InvalidSchema(String),

    #[error("Layout mismatch: {0}")]
    LayoutMismatch(String),
}

/// Rendering error
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Nothing to export: the row set is empty")]
    NothingToExport,

    #[error("Sheet '{sheet}' row {row} has {found} cells, header has {expected}")]
    ColumnMismatch {
        sheet: String,
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Top-level export error
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Pivot(#[from] PivotError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl ExportError {
    /// True when the export was refused because there was nothing to export
    pub fn is_empty_result(&self) -> bool {
        matches!(
            self,
            ExportError::Pivot(PivotError::EmptyResult)
                | ExportError::Render(RenderError::NothingToExport)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
