//! Time bucket assignment
//!
//! Maps a record's temporal value to exactly one [`TimeBucket`] relative to
//! the reporting year.
//!
//! # Algorithm
//!
//! 1. Date text is parsed as `DD.MM.YYYY` first, then as an ISO-like date
//! 2. Explicit year/month integers are used as-is (month is 1-based)
//! 3. Years outside the accepted range, months outside 1-12 and parse
//!    failures resolve to `NoDate`
//! 4. year < reporting year → `PastYear`, equal → `CurrentYearMonth`,
//!    greater → `FutureYear`

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use pivotbook_core::{
    BucketedRecord, MalformedRecord, NormalizedRecord, TemporalValue, TimeBucket, YearRange,
};

/// Date-only formats, tried in order
const DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%Y-%m-%d", "%Y/%m/%d"];

/// Date-time formats whose time part is ignored
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

/// Parse a date-like string; `None` when no known format matches
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Assigns time buckets relative to a fixed reporting year
#[derive(Debug, Clone, Copy)]
pub struct TimeBucketAssigner {
    reporting_year: i32,
    year_range: YearRange,
}

impl TimeBucketAssigner {
    pub fn new(reporting_year: i32, year_range: YearRange) -> Self {
        Self {
            reporting_year,
            year_range,
        }
    }

    pub fn reporting_year(&self) -> i32 {
        self.reporting_year
    }

    /// Bucket of a calendar (year, 1-based month); `None` for months outside 1-12
    pub fn bucket_for(&self, year: i32, month: u32) -> Option<TimeBucket> {
        if !(1..=12).contains(&month) {
            return None;
        }
        Some(match year.cmp(&self.reporting_year) {
            std::cmp::Ordering::Less => TimeBucket::PastYear(year),
            std::cmp::Ordering::Equal => TimeBucket::CurrentYearMonth(month - 1),
            std::cmp::Ordering::Greater => TimeBucket::FutureYear(year),
        })
    }

    /// Resolve a temporal value; anomalies are pushed to `issues`
    pub fn resolve(
        &self,
        index: usize,
        temporal: &TemporalValue,
        issues: &mut Vec<MalformedRecord>,
    ) -> TimeBucket {
        let (year, month) = match temporal {
            TemporalValue::Absent => return TimeBucket::NoDate,
            TemporalValue::YearMonth { year, month } => (*year, *month),
            TemporalValue::DateText(text) => match parse_date(text) {
                Some(date) => (i64::from(date.year()), i64::from(date.month())),
                None => {
                    issues.push(MalformedRecord::UnparseableDate {
                        index,
                        value: text.clone(),
                    });
                    return TimeBucket::NoDate;
                }
            },
        };

        if !self.year_range.contains(year) {
            issues.push(MalformedRecord::YearOutOfRange { index, year });
            return TimeBucket::NoDate;
        }
        // The year fits after the range check above
        let bucket = u32::try_from(month)
            .ok()
            .and_then(|m| self.bucket_for(year as i32, m));
        bucket.unwrap_or_else(|| {
            issues.push(MalformedRecord::InvalidMonth { index, month });
            TimeBucket::NoDate
        })
    }

    pub fn assign(
        &self,
        index: usize,
        record: NormalizedRecord,
        issues: &mut Vec<MalformedRecord>,
    ) -> BucketedRecord {
        let bucket = self.resolve(index, &record.temporal, issues);
        BucketedRecord {
            dimensions: record.dimensions,
            measure: record.measure,
            bucket,
        }
    }

    /// Bucket every record; output has the input's length and order
    pub fn assign_all(
        &self,
        records: Vec<NormalizedRecord>,
        issues: &mut Vec<MalformedRecord>,
    ) -> Vec<BucketedRecord> {
        records
            .into_iter()
            .enumerate()
            .map(|(index, record)| self.assign(index, record, issues))
            .collect()
    }
}
