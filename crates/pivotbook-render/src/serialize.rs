//! Workbook serialization
//!
//! Lowers a [`PivotTable`] (or a plain [`TableSource`]) into the
//! backend-neutral [`Workbook`] model:
//!
//! - **Grouped sheet**: one label column, a summary row above each group,
//!   leaves indented below it
//! - **Flat sheet**: dimension values as plain leading columns
//!
//! Both sheets come from the same pivot, so their grand totals match.
//!
//! ## Example Output Structure
//!
//! ```text
//! Sheet: Grouped
//! | Group      | Total | Non-date | Jan | Feb | ... |
//! |------------|-------|----------|-----|-----|-----|
//! | A          |    18 |          |  13 |   5 | ... |   <- group row (fill by depth)
//! |   Russia   |    15 |          |  10 |   5 | ... |
//! |   CIS      |     3 |          |   3 |     | ... |
//! | Grand Total|    18 |          |  13 |   5 | ... |   <- FFF2CC, top border
//! ```

use pivotbook_core::{
    BorderWeight, Cell, CellStyle, ColumnKind, ColumnSpec, HAlign, MergedRange, PivotLine,
    PivotRow, PivotTable, RenderError, Sheet, StyleOptions, TableSource, ValuePolicy, Workbook,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Auto-width bounds of tabular exports, in character widths
const MIN_AUTO_WIDTH: f64 = 11.0;
const MAX_AUTO_WIDTH: f64 = 50.0;

/// Lowers pivots and tables into workbook sheets under one style policy
#[derive(Clone, Debug)]
pub struct WorkbookSerializer<'a> {
    style: &'a StyleOptions,
}

impl<'a> WorkbookSerializer<'a> {
    pub fn new(style: &'a StyleOptions) -> Self {
        Self { style }
    }

    /// Grouped and/or flat sheets of one pivot, as enabled in the style
    pub fn serialize(&self, pivot: &PivotTable) -> Result<Workbook, RenderError> {
        if pivot.is_empty() {
            return Err(RenderError::NothingToExport);
        }
        let mut workbook = Workbook::new();
        if self.style.grouped_sheet {
            workbook.sheets.push(self.grouped_sheet(pivot));
        }
        if self.style.flat_sheet {
            workbook.sheets.push(self.flat_sheet(pivot));
        }
        if workbook.sheets.is_empty() {
            return Err(RenderError::InvalidData(
                "both grouped and flat sheets are disabled".into(),
            ));
        }
        workbook.validate()?;
        Ok(workbook)
    }

    /// Workbook with one sheet for a tabular result set
    pub fn serialize_table(&self, source: &dyn TableSource) -> Result<Workbook, RenderError> {
        let sheet = self.table_sheet(source)?;
        let workbook = Workbook { sheets: vec![sheet] };
        workbook.validate()?;
        Ok(workbook)
    }

    // =========================================================================
    // Pivot sheets
    // =========================================================================

    pub fn grouped_sheet(&self, pivot: &PivotTable) -> Sheet {
        let measures: Vec<&ColumnSpec> = pivot.measure_columns().collect();
        let mut sheet = Sheet::new(&self.style.grouped_sheet_name);
        self.push_header(&mut sheet, &[self.style.group_header.as_str()], &measures);

        for line in pivot.outline() {
            let row = match line {
                PivotLine::Group {
                    depth,
                    label,
                    values,
                } => {
                    let mut style = CellStyle::new();
                    if let Some(fill) = self.style.group_fill(depth) {
                        style = style.fill(fill);
                    }
                    if depth < self.style.bold_group_levels {
                        style = style.bold();
                    }
                    self.body_row(vec![indent(depth, &label)], &values, &measures, &style)
                }
                PivotLine::Leaf { depth, label, row } => self.body_row(
                    vec![indent(depth, &label)],
                    &row.values,
                    &measures,
                    &CellStyle::new(),
                ),
            };
            sheet.rows.push(row);
        }
        sheet.rows.push(self.total_row(
            vec![self.style.grand_total_label.clone()],
            &pivot.grand_total,
            &measures,
        ));

        sheet.column_widths = std::iter::once(self.style.label_width)
            .chain(measures.iter().map(|_| self.style.measure_width))
            .collect();
        sheet
    }

    pub fn flat_sheet(&self, pivot: &PivotTable) -> Sheet {
        let keys: Vec<&str> = pivot.key_columns().map(|c| c.label.as_str()).collect();
        let measures: Vec<&ColumnSpec> = pivot.measure_columns().collect();
        let mut sheet = Sheet::new(&self.style.flat_sheet_name);
        self.push_header(&mut sheet, &keys, &measures);

        for row in &pivot.rows {
            let labels = (0..keys.len())
                .map(|i| row.labels.get(i).cloned().unwrap_or_default())
                .collect();
            sheet
                .rows
                .push(self.body_row(labels, &row.values, &measures, &CellStyle::new()));
        }

        let mut total_labels = vec![String::new(); keys.len()];
        if let Some(first) = total_labels.first_mut() {
            first.clone_from(&self.style.flat_total_label);
        }
        sheet
            .rows
            .push(self.total_row(total_labels, &pivot.grand_total, &measures));

        sheet.column_widths = keys
            .iter()
            .map(|_| self.style.key_width)
            .chain(measures.iter().map(|_| self.style.measure_width))
            .collect();
        sheet
    }

    /// One header row, or two when measure columns sit under super-headers
    fn push_header(&self, sheet: &mut Sheet, leading: &[&str], measures: &[&ColumnSpec]) {
        let style = self.header_style();
        let two_rows = measures.iter().any(|c| c.group.is_some());
        sheet.freeze_header = self.style.freeze_header;

        if !two_rows {
            sheet.header_rows = 1;
            let row = leading
                .iter()
                .copied()
                .chain(measures.iter().map(|c| c.label.as_str()))
                .map(|label| Cell::text(label).style(style.clone()))
                .collect();
            sheet.rows.push(row);
            return;
        }

        sheet.header_rows = 2;
        let mut top = Vec::new();
        let mut bottom = Vec::new();
        let mut col = 0u16;

        // Leading and ungrouped columns span both rows
        for label in leading {
            top.push(Cell::text(*label).style(style.clone()));
            bottom.push(Cell::empty().style(style.clone()));
            sheet.merges.push(MergedRange::new(0, col, 1, col));
            col += 1;
        }

        let mut i = 0;
        while i < measures.len() {
            match &measures[i].group {
                None => {
                    top.push(Cell::text(&measures[i].label).style(style.clone()));
                    bottom.push(Cell::empty().style(style.clone()));
                    sheet.merges.push(MergedRange::new(0, col, 1, col));
                    col += 1;
                    i += 1;
                }
                Some(group) => {
                    let start = col;
                    while i < measures.len() && measures[i].group.as_ref() == Some(group) {
                        let head = if col == start {
                            Cell::text(group)
                        } else {
                            Cell::empty()
                        };
                        top.push(head.style(style.clone()));
                        bottom.push(Cell::text(&measures[i].label).style(style.clone()));
                        col += 1;
                        i += 1;
                    }
                    let span = MergedRange::new(0, start, 0, col - 1);
                    if !span.is_single_cell() {
                        sheet.merges.push(span);
                    }
                }
            }
        }

        sheet.rows.push(top);
        sheet.rows.push(bottom);
    }

    fn body_row(
        &self,
        labels: Vec<String>,
        values: &[Decimal],
        measures: &[&ColumnSpec],
        base: &CellStyle,
    ) -> Vec<Cell> {
        let mut cells: Vec<Cell> = labels
            .into_iter()
            .map(|label| Cell::text(label).style(base.clone()))
            .collect();
        cells.extend(
            measures
                .iter()
                .zip(values)
                .map(|(column, value)| self.measure_cell(*value, column.policy, base)),
        );
        cells
    }

    fn total_row(&self, labels: Vec<String>, total: &PivotRow, measures: &[&ColumnSpec]) -> Vec<Cell> {
        let style = CellStyle::new()
            .fill(self.style.total_fill)
            .bold()
            .border_top(BorderWeight::Medium);
        self.body_row(labels, &total.values, measures, &style)
    }

    /// Zero renders as an empty cell; the pivot still holds the zero
    fn measure_cell(&self, value: Decimal, policy: ValuePolicy, base: &CellStyle) -> Cell {
        let mut style = base.clone().align(HAlign::Right);
        if value.is_zero() {
            return Cell::text("").style(style);
        }
        match policy {
            ValuePolicy::Plain => style = style.number_format(&self.style.number_format),
            ValuePolicy::Emphasis => {
                style = style.number_format(&self.style.number_format).bold();
            }
            ValuePolicy::Diff => {
                let color = if value > Decimal::ZERO {
                    self.style.positive_color
                } else {
                    self.style.negative_color
                };
                style = style
                    .number_format(&self.style.diff_number_format)
                    .font_color(color);
            }
        }
        Cell::number(value.to_f64().unwrap_or_default()).style(style)
    }

    fn header_style(&self) -> CellStyle {
        CellStyle::new()
            .fill(self.style.header_fill)
            .font_color(self.style.header_font)
            .bold()
            .align(HAlign::Center)
    }

    // =========================================================================
    // Table sheet
    // =========================================================================

    pub fn table_sheet(&self, source: &dyn TableSource) -> Result<Sheet, RenderError> {
        let columns = source.columns();
        let records = source.records();
        if records.is_empty() {
            return Err(RenderError::NothingToExport);
        }
        if columns.is_empty() {
            return Err(RenderError::InvalidData("table has no columns".into()));
        }

        let mut sheet = Sheet::new(source.sheet_name());
        sheet.freeze_header = self.style.freeze_header;
        let header = self.header_style();
        sheet.rows.push(
            columns
                .iter()
                .map(|c| Cell::text(c.header_text()).style(header.clone()))
                .collect(),
        );

        let mut widths: Vec<usize> = columns
            .iter()
            .map(|c| c.header_text().chars().count())
            .collect();

        for record in records {
            let mut row = Vec::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                let cell = match column.kind {
                    ColumnKind::Number => match record.get(&column.field).and_then(|v| v.as_decimal()) {
                        Some(value) => {
                            widths[i] = widths[i].max(value.to_string().chars().count());
                            let format = column
                                .number_format
                                .as_deref()
                                .unwrap_or(&self.style.number_format);
                            Cell::number(value.to_f64().unwrap_or_default()).style(
                                CellStyle::new().number_format(format).align(HAlign::Right),
                            )
                        }
                        None => Cell::text(""),
                    },
                    ColumnKind::Text => {
                        let text = record
                            .text(&column.field)
                            .map(|t| t.into_owned())
                            .unwrap_or_default();
                        widths[i] = widths[i].max(text.chars().count());
                        Cell::text(text)
                    }
                };
                row.push(cell);
            }
            sheet.rows.push(row);
        }

        sheet.column_widths = columns
            .iter()
            .zip(widths)
            .map(|(column, len)| {
                column
                    .width
                    .unwrap_or_else(|| (len as f64 + 2.0).clamp(MIN_AUTO_WIDTH, MAX_AUTO_WIDTH))
            })
            .collect();
        Ok(sheet)
    }
}

fn indent(depth: usize, label: &str) -> String {
    format!("{}{label}", "  ".repeat(depth))
}
