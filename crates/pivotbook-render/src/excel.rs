//! XLSX backend
//!
//! Writes a [`Workbook`] model with `rust_xlsxwriter`:
//! - Numeric cells are written as numbers with their number format attached,
//!   so the spreadsheet application applies locale formatting
//! - Distinct cell styles share one native `Format`
//! - Merged ranges carry the text and style of their top-left cell
//! - Header rows are frozen when the sheet asks for it
//! - The document creation time can be pinned so identical workbooks give
//!   identical bytes

use chrono::{Datelike, NaiveDateTime, Timelike};
use pivotbook_core::{
    BorderWeight, CellStyle, CellValue, HAlign, RenderError, Renderer, Sheet, Workbook,
};
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, FormatAlign, FormatBorder, Worksheet};
use std::collections::{HashMap, HashSet};

/// Renders workbooks to XLSX bytes
#[derive(Clone, Debug, Default)]
pub struct XlsxRenderer {
    /// Creation time written to the document properties; `None` uses the
    /// current time
    created: Option<NaiveDateTime>,
}

impl XlsxRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created_at(mut self, created: NaiveDateTime) -> Self {
        self.created = Some(created);
        self
    }

    fn properties(&self) -> Result<Option<DocProperties>, RenderError> {
        let Some(created) = self.created else {
            return Ok(None);
        };
        let stamp = ExcelDateTime::from_ymd(
            created.year() as u16,
            created.month() as u8,
            created.day() as u8,
        )
        .and_then(|date| date.and_hms(created.hour() as u16, created.minute() as u8, created.second()))
        .map_err(|e| RenderError::Format(format!("Invalid creation time {created}: {e}")))?;
        Ok(Some(DocProperties::new().set_creation_datetime(&stamp)))
    }

    fn write_sheet(
        &self,
        worksheet: &mut Worksheet,
        sheet: &Sheet,
        formats: &mut FormatCache,
    ) -> Result<(), RenderError> {
        worksheet
            .set_name(&sheet.name)
            .map_err(|e| RenderError::Format(format!("Invalid sheet name '{}': {e}", sheet.name)))?;

        let covered: HashSet<(u32, u16)> = sheet
            .merges
            .iter()
            .flat_map(|m| {
                (m.first_row..=m.last_row)
                    .flat_map(move |r| (m.first_col..=m.last_col).map(move |c| (r, c)))
            })
            .collect();

        for (r, row) in sheet.rows.iter().enumerate() {
            let r = r as u32;
            for (c, cell) in row.iter().enumerate() {
                let c = c as u16;
                if covered.contains(&(r, c)) {
                    continue;
                }
                let format = formats.get(&cell.style);
                match &cell.value {
                    CellValue::Number(n) => worksheet
                        .write_number_with_format(r, c, *n, format)
                        .map(|_| ()),
                    CellValue::Text(s) if !s.is_empty() => worksheet
                        .write_string_with_format(r, c, s, format)
                        .map(|_| ()),
                    CellValue::Text(_) | CellValue::Empty => {
                        worksheet.write_blank(r, c, format).map(|_| ())
                    }
                }
                .map_err(|e| RenderError::Format(e.to_string()))?;
            }
        }

        for merge in &sheet.merges {
            let anchor = sheet.cell(merge.first_row as usize, merge.first_col as usize);
            let text = anchor
                .and_then(|cell| cell.value.as_text())
                .unwrap_or_default();
            let style = anchor.map(|cell| cell.style.clone()).unwrap_or_default();
            worksheet
                .merge_range(
                    merge.first_row,
                    merge.first_col,
                    merge.last_row,
                    merge.last_col,
                    text,
                    formats.get(&style),
                )
                .map_err(|e| RenderError::Format(e.to_string()))?;
        }

        for (col, width) in sheet.column_widths.iter().enumerate() {
            worksheet
                .set_column_width(col as u16, *width)
                .map_err(|e| RenderError::Format(format!("Column {col} width {width}: {e}")))?;
        }

        if sheet.freeze_header && sheet.header_rows > 0 {
            worksheet
                .set_freeze_panes(sheet.header_rows as u32, 0)
                .map_err(|e| RenderError::Format(e.to_string()))?;
        }
        Ok(())
    }
}

impl Renderer for XlsxRenderer {
    type Output = Vec<u8>;

    fn render(&self, workbook: &Workbook) -> Result<Vec<u8>, RenderError> {
        workbook.validate()?;

        let mut xlsx = rust_xlsxwriter::Workbook::new();
        if let Some(properties) = self.properties()? {
            xlsx.set_properties(&properties);
        }
        let mut formats = FormatCache::default();
        for sheet in &workbook.sheets {
            let worksheet = xlsx.add_worksheet();
            self.write_sheet(worksheet, sheet, &mut formats)?;
        }

        xlsx.save_to_buffer()
            .map_err(|e| RenderError::Format(format!("Failed to create Excel: {e}")))
    }
}

/// One native format per distinct cell style
#[derive(Default)]
struct FormatCache {
    formats: HashMap<CellStyle, Format>,
}

impl FormatCache {
    fn get(&mut self, style: &CellStyle) -> &Format {
        self.formats
            .entry(style.clone())
            .or_insert_with(|| to_format(style))
    }
}

fn to_format(style: &CellStyle) -> Format {
    let mut format = Format::new();
    if let Some(fill) = style.fill {
        format = format.set_background_color(fill.0);
    }
    if style.bold {
        format = format.set_bold();
    }
    if let Some(color) = style.font_color {
        format = format.set_font_color(color.0);
    }
    if let Some(num_format) = &style.number_format {
        format = format.set_num_format(num_format);
    }
    if let Some(weight) = style.border_top {
        let border = match weight {
            BorderWeight::Thin => FormatBorder::Thin,
            BorderWeight::Medium => FormatBorder::Medium,
        };
        format = format.set_border_top(border).set_border_top_color(0x000000);
    }
    match style.align {
        HAlign::General => {}
        HAlign::Left => format = format.set_align(FormatAlign::Left),
        HAlign::Center => {
            format = format
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter);
        }
        HAlign::Right => format = format.set_align(FormatAlign::Right),
    }
    format
}

#[cfg(test)]
mod tests {
    use super::*;
    use pivotbook_core::{Cell, MergedRange, Rgb};

    fn sheet() -> Sheet {
        let mut sheet = Sheet::new("Flat");
        sheet.rows.push(vec![
            Cell::text("Market").style(CellStyle::new().bold().fill(Rgb(0x002060))),
            Cell::text("Total"),
        ]);
        sheet.rows.push(vec![Cell::text("CIS"), Cell::number(3.0)]);
        sheet.column_widths = vec![22.0, 12.0];
        sheet.freeze_header = true;
        sheet
    }

    #[test]
    fn renders_zip_container() {
        let workbook = Workbook {
            sheets: vec![sheet()],
        };
        let bytes = XlsxRenderer::new().render(&workbook).unwrap();
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn ragged_sheet_is_refused() {
        let mut s = sheet();
        s.rows[1].pop();
        let workbook = Workbook { sheets: vec![s] };
        let err = XlsxRenderer::new().render(&workbook).unwrap_err();
        assert!(matches!(err, RenderError::ColumnMismatch { .. }));
    }

    #[test]
    fn merged_header_renders() {
        let mut s = sheet();
        s.rows[0][1] = Cell::empty();
        s.merges.push(MergedRange::new(0, 0, 0, 1));
        let workbook = Workbook { sheets: vec![s] };
        assert!(XlsxRenderer::new().render(&workbook).is_ok());
    }

    #[test]
    fn width_beyond_last_column_is_an_error() {
        let mut s = sheet();
        s.column_widths = vec![10.0; 16_385];
        let workbook = Workbook { sheets: vec![s] };
        let err = XlsxRenderer::new().render(&workbook).unwrap_err();
        assert!(matches!(err, RenderError::Format(ref msg) if msg.contains("Column 16384")));
    }

    #[test]
    fn pinned_creation_time_gives_identical_bytes() {
        let created = chrono::NaiveDate::from_ymd_opt(2024, 9, 15)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        let renderer = XlsxRenderer::new().created_at(created);
        let workbook = Workbook {
            sheets: vec![sheet()],
        };
        let first = renderer.render(&workbook).unwrap();
        let second = renderer.render(&workbook).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn styles_share_formats() {
        let mut cache = FormatCache::default();
        let style = CellStyle::new().bold();
        cache.get(&style);
        cache.get(&CellStyle::new().bold());
        cache.get(&CellStyle::new());
        assert_eq!(cache.formats.len(), 2);
    }
}
