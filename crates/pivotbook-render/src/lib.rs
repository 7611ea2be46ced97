//! # pivotbook-render
//!
//! Serialization and rendering backends for pivotbook.
//!
//! This crate provides:
//! - `WorkbookSerializer`: pivot/table → backend-neutral workbook model
//! - `XlsxRenderer`: workbook model → XLSX bytes
//! - `TextRenderer`: workbook model → aligned plain text for terminals
//! - `ExportOrchestrator`: raw records → file name + bytes
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use pivotbook_core::{
//!     DimensionField, ExportName, GroupingSpec, RawRecord, StyleOptions, TemporalSource,
//!     ViewSchema,
//! };
//! use pivotbook_render::{ExportOrchestrator, ExportSource};
//!
//! let view = ViewSchema::new("QTY")
//!     .dimension(DimensionField::new("Market"))
//!     .temporal(TemporalSource::year_month("Year", "Month"));
//! let spec = GroupingSpec::new(view, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
//! let records = vec![RawRecord::new().with("Market", "CIS").with("QTY", 3)];
//!
//! let artifact = ExportOrchestrator::new(ExportName::new("orders").version(3))
//!     .export(ExportSource::Records(&records), &spec, &StyleOptions::default())
//!     .unwrap();
//! assert_eq!(artifact.file_name, "orders_v3.xlsx");
//! ```

pub mod excel;
pub mod export;
pub mod serialize;

pub use excel::XlsxRenderer;
pub use export::{ExportArtifact, ExportOrchestrator, ExportSource};
pub use serialize::WorkbookSerializer;

use pivotbook_core::{Cell, CellValue, RenderError, Renderer, Sheet, Workbook};

/// Plain-text preview of a workbook, one block per sheet
#[derive(Clone, Debug)]
pub struct TextRenderer {
    /// Separator between columns
    pub separator: String,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self {
            separator: " | ".into(),
        }
    }
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn render_sheet(&self, sheet: &Sheet, out: &mut String) {
        let cells: Vec<Vec<(String, bool)>> = sheet
            .rows
            .iter()
            .map(|row| row.iter().map(display).collect())
            .collect();

        let mut widths = vec![0usize; sheet.width()];
        for row in &cells {
            for (w, (text, _)) in widths.iter_mut().zip(row) {
                *w = (*w).max(text.chars().count());
            }
        }

        out.push_str(&format!("== {} ==\n", sheet.name));
        for (i, row) in cells.iter().enumerate() {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|((text, numeric), &w)| {
                    if *numeric {
                        format!("{text:>w$}")
                    } else {
                        format!("{text:<w$}")
                    }
                })
                .collect();
            out.push_str(line.join(&self.separator).trim_end());
            out.push('\n');

            if i + 1 == sheet.header_rows {
                let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
                out.push_str(&rule.join(&self.separator.replace(' ', "-")));
                out.push('\n');
            }
        }
    }
}

impl Renderer for TextRenderer {
    type Output = String;

    fn render(&self, workbook: &Workbook) -> Result<String, RenderError> {
        workbook.validate()?;
        let mut out = String::new();
        for (i, sheet) in workbook.sheets.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            self.render_sheet(sheet, &mut out);
        }
        Ok(out)
    }
}

/// Display text of a cell and whether it is right-aligned
fn display(cell: &Cell) -> (String, bool) {
    match &cell.value {
        CellValue::Text(s) => (s.clone(), false),
        CellValue::Empty => (String::new(), false),
        CellValue::Number(n) => (
            format_number(*n, cell.style.number_format.as_deref()),
            true,
        ),
    }
}

/// Approximates the spreadsheet rendering of `#,##0` style formats
fn format_number(value: f64, format: Option<&str>) -> String {
    let decimals = format
        .and_then(|f| f.split(';').next())
        .and_then(|f| f.split_once('.'))
        .map_or(0, |(_, frac)| frac.chars().filter(|c| *c == '0').count());
    let text = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (text, None),
    };

    let grouped = if format.is_some_and(|f| f.contains(',')) {
        group_thousands(&int_part)
    } else {
        int_part
    };

    let sign = if value < 0.0 {
        "-"
    } else if value > 0.0 && format.is_some_and(|f| f.starts_with('+')) {
        "+"
    } else {
        ""
    };
    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
