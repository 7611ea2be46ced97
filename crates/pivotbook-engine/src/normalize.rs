//! Record normalization
//!
//! Turns loosely-typed raw records into [`NormalizedRecord`]s for one view:
//!
//! 1. Dimension values are trimmed; null or blank values get the field's placeholder
//! 2. The measure is read as an exact decimal; missing, non-numeric or
//!    out-of-range values become 0
//! 3. Temporal fields are extracted but not yet interpreted
//!
//! Normalization never drops or adds records. Data quality problems are
//! collected as [`MalformedRecord`] issues instead of failing the batch.

use pivotbook_core::{
    MalformedRecord, NormalizedRecord, RawRecord, Scalar, TemporalSource, TemporalValue,
    ViewSchema,
};
use rust_decimal::Decimal;

/// Largest accepted measure magnitude. Sums of any realistic number of
/// records stay far below `Decimal::MAX` with this bound.
pub const MEASURE_LIMIT: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

/// Normalized records plus the anomalies absorbed along the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizationReport {
    /// Same length and order as the input
    pub records: Vec<NormalizedRecord>,
    pub issues: Vec<MalformedRecord>,
}

impl NormalizationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Per-view record normalizer
#[derive(Debug, Clone)]
pub struct RecordNormalizer<'a> {
    schema: &'a ViewSchema,
    measure: &'a str,
}

impl<'a> RecordNormalizer<'a> {
    pub fn new(schema: &'a ViewSchema) -> Self {
        Self {
            schema,
            measure: &schema.measure,
        }
    }

    /// Read the measure from another field (fact rows of a plan/fact view)
    pub fn with_measure(mut self, field: &'a str) -> Self {
        self.measure = field;
        self
    }

    pub fn normalize(&self, records: &[RawRecord]) -> NormalizationReport {
        let mut issues = Vec::new();
        let records = records
            .iter()
            .enumerate()
            .map(|(index, record)| self.normalize_record(index, record, &mut issues))
            .collect();
        NormalizationReport { records, issues }
    }

    pub fn normalize_record(
        &self,
        index: usize,
        record: &RawRecord,
        issues: &mut Vec<MalformedRecord>,
    ) -> NormalizedRecord {
        let dimensions = self
            .schema
            .dimensions
            .iter()
            .map(|dim| {
                record
                    .text(&dim.field)
                    .map_or_else(|| dim.placeholder_text().to_string(), |v| v.into_owned())
            })
            .collect();

        NormalizedRecord {
            dimensions,
            measure: self.measure_of(index, record, issues),
            temporal: self.temporal_of(index, record, issues),
        }
    }

    fn measure_of(
        &self,
        index: usize,
        record: &RawRecord,
        issues: &mut Vec<MalformedRecord>,
    ) -> Decimal {
        let Some(value) = record.get(self.measure) else {
            return Decimal::ZERO;
        };
        if value.is_null() || matches!(value, Scalar::Text(s) if s.trim().is_empty()) {
            return Decimal::ZERO;
        }
        let Some(measure) = value.as_decimal() else {
            issues.push(MalformedRecord::NonNumericMeasure {
                index,
                field: self.measure.to_string(),
                value: describe(value),
            });
            return Decimal::ZERO;
        };
        if measure.abs() > MEASURE_LIMIT {
            issues.push(MalformedRecord::MeasureOutOfRange {
                index,
                field: self.measure.to_string(),
                value: measure.to_string(),
                limit: MEASURE_LIMIT,
            });
            return Decimal::ZERO;
        }
        measure
    }

    fn temporal_of(
        &self,
        index: usize,
        record: &RawRecord,
        issues: &mut Vec<MalformedRecord>,
    ) -> TemporalValue {
        match &self.schema.temporal {
            TemporalSource::Absent => TemporalValue::Absent,
            TemporalSource::Date { field } => record
                .text(field)
                .map_or(TemporalValue::Absent, |s| TemporalValue::DateText(s.into_owned())),
            TemporalSource::YearMonth {
                year_field,
                month_field,
            } => {
                let year = period_field(index, record, year_field, issues);
                let month = period_field(index, record, month_field, issues);
                match (year, month) {
                    (Some(year), Some(month)) => TemporalValue::YearMonth { year, month },
                    _ => TemporalValue::Absent,
                }
            }
        }
    }
}

fn period_field(
    index: usize,
    record: &RawRecord,
    field: &str,
    issues: &mut Vec<MalformedRecord>,
) -> Option<i64> {
    let value = record.get(field)?;
    if value.as_text().is_none() {
        return None;
    }
    let parsed = value.as_integer();
    if parsed.is_none() {
        issues.push(MalformedRecord::NonIntegerPeriod {
            index,
            field: field.to_string(),
            value: describe(value),
        });
    }
    parsed
}

fn describe(value: &Scalar) -> String {
    value
        .as_text()
        .map_or_else(String::new, |text| text.into_owned())
}
