//! Backend-neutral workbook model
//!
//! The serializer in `pivotbook-render` lowers a [`PivotTable`](crate::PivotTable)
//! into this model; renderers only ever see a [`Workbook`]. Keeping the model
//! plain data makes the visual output testable without parsing xlsx bytes.

use serde::{Deserialize, Serialize};

use crate::RenderError;

// ============================================================================
// Colors
// ============================================================================

/// 24-bit RGB color, serialized as `"#RRGGBB"`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub u32);

impl Rgb {
    pub fn hex(&self) -> String {
        format!("#{:06X}", self.0 & 0x00FF_FFFF)
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let digits = value.trim().trim_start_matches('#');
        if digits.len() != 6 {
            return Err(format!("expected a #RRGGBB color, got '{value}'"));
        }
        u32::from_str_radix(digits, 16)
            .map(Rgb)
            .map_err(|_| format!("expected a #RRGGBB color, got '{value}'"))
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.hex()
    }
}

// ============================================================================
// Cells
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Text(String),
    Number(f64),
    /// Styled cell without content (merge fillers, zero measures)
    Empty,
}

/// Kind of a cell's value, for assertions and column checks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    Text,
    Number,
    Empty,
}

impl CellValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            CellValue::Text(_) => ValueType::Text,
            CellValue::Number(_) => ValueType::Number,
            CellValue::Empty => ValueType::Empty,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BorderWeight {
    Thin,
    Medium,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HAlign {
    #[default]
    General,
    Left,
    Center,
    Right,
}

/// Visual attributes of one cell
///
/// Styles are compared and hashed so renderers can share one native format
/// object per distinct style.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellStyle {
    pub fill: Option<Rgb>,
    pub bold: bool,
    pub font_color: Option<Rgb>,
    pub number_format: Option<String>,
    pub border_top: Option<BorderWeight>,
    pub align: HAlign,
}

impl CellStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill(mut self, color: Rgb) -> Self {
        self.fill = Some(color);
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn font_color(mut self, color: Rgb) -> Self {
        self.font_color = Some(color);
        self
    }

    pub fn number_format(mut self, format: impl Into<String>) -> Self {
        self.number_format = Some(format.into());
        self
    }

    pub fn border_top(mut self, weight: BorderWeight) -> Self {
        self.border_top = Some(weight);
        self
    }

    pub fn align(mut self, align: HAlign) -> Self {
        self.align = align;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: CellValue,
    pub style: CellStyle,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: CellValue::Text(value.into()),
            style: CellStyle::default(),
        }
    }

    pub fn number(value: f64) -> Self {
        Self {
            value: CellValue::Number(value),
            style: CellStyle::default(),
        }
    }

    pub fn empty() -> Self {
        Self {
            value: CellValue::Empty,
            style: CellStyle::default(),
        }
    }

    pub fn style(mut self, style: CellStyle) -> Self {
        self.style = style;
        self
    }
}

// ============================================================================
// Sheets
// ============================================================================

/// Inclusive, zero-based cell rectangle rendered as one merged cell
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedRange {
    pub first_row: u32,
    pub first_col: u16,
    pub last_row: u32,
    pub last_col: u16,
}

impl MergedRange {
    pub fn new(first_row: u32, first_col: u16, last_row: u32, last_col: u16) -> Self {
        Self {
            first_row,
            first_col,
            last_row,
            last_col,
        }
    }

    pub fn is_single_cell(&self) -> bool {
        self.first_row == self.last_row && self.first_col == self.last_col
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    /// Row-major cells; header rows first
    pub rows: Vec<Vec<Cell>>,
    pub column_widths: Vec<f64>,
    /// Number of leading header rows
    pub header_rows: usize,
    /// Keep the header rows visible while scrolling
    pub freeze_header: bool,
    pub merges: Vec<MergedRange>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
            column_widths: Vec::new(),
            header_rows: 1,
            freeze_header: false,
            merges: Vec::new(),
        }
    }

    /// Width of the first header row; every row must match it
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn data_rows(&self) -> &[Vec<Cell>] {
        &self.rows[self.header_rows.min(self.rows.len())..]
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Check the row/column contract before handing the sheet to a renderer
    pub fn validate(&self) -> Result<(), RenderError> {
        let expected = self.width();
        for (row, cells) in self.rows.iter().enumerate() {
            if cells.len() != expected {
                return Err(RenderError::ColumnMismatch {
                    sheet: self.name.clone(),
                    row,
                    expected,
                    found: cells.len(),
                });
            }
        }
        for merge in &self.merges {
            if merge.first_row > merge.last_row
                || merge.first_col > merge.last_col
                || merge.last_row as usize >= self.rows.len()
                || merge.last_col as usize >= expected
            {
                return Err(RenderError::InvalidData(format!(
                    "merge {merge:?} is outside sheet '{}'",
                    self.name
                )));
            }
            if merge.is_single_cell() {
                return Err(RenderError::InvalidData(format!(
                    "merge {merge:?} in sheet '{}' covers a single cell",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if self.sheets.is_empty() {
            return Err(RenderError::InvalidData("workbook has no sheets".into()));
        }
        self.sheets.iter().try_for_each(Sheet::validate)
    }
}
