//! Plain tabular exports
//!
//! Not every download is a pivot: some result sets are exported as they are,
//! one row per record. A [`TableSource`] describes such a result set.

use serde::{Deserialize, Serialize};

use crate::{FieldName, PivotError, RawRecord};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    #[default]
    Text,
    Number,
}

/// One output column of a tabular export
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableColumn {
    pub field: FieldName,
    /// Header text; defaults to the field name
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub kind: ColumnKind,
    #[serde(default)]
    pub number_format: Option<String>,
    /// Explicit width; computed from the content when absent
    #[serde(default)]
    pub width: Option<f64>,
}

impl TableColumn {
    pub fn new(field: impl Into<FieldName>) -> Self {
        Self {
            field: field.into(),
            header: None,
            kind: ColumnKind::Text,
            number_format: None,
            width: None,
        }
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    pub fn number(mut self) -> Self {
        self.kind = ColumnKind::Number;
        self
    }

    pub fn number_format(mut self, format: impl Into<String>) -> Self {
        self.number_format = Some(format.into());
        self
    }

    pub fn width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    pub fn header_text(&self) -> &str {
        self.header.as_deref().unwrap_or(&self.field)
    }
}

/// A result set exported without pivoting
pub trait TableSource {
    fn sheet_name(&self) -> &str;

    fn columns(&self) -> &[TableColumn];

    fn records(&self) -> &[RawRecord];
}

/// `[table]` section of a view file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    pub columns: Vec<TableColumn>,
}

fn default_sheet_name() -> String {
    "Data".to_string()
}

impl TableConfig {
    pub fn validate(&self) -> Result<(), PivotError> {
        if self.columns.is_empty() {
            return Err(PivotError::InvalidSchema("table has no columns".into()));
        }
        if let Some(col) = self.columns.iter().find(|c| c.field.trim().is_empty()) {
            return Err(PivotError::InvalidSchema(format!(
                "table column '{}' has an empty field name",
                col.header_text()
            )));
        }
        Ok(())
    }

    pub fn with_records(&self, records: Vec<RawRecord>) -> RecordTable {
        RecordTable {
            sheet_name: self.sheet_name.clone(),
            columns: self.columns.clone(),
            records,
        }
    }
}

/// In-memory [`TableSource`]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordTable {
    pub sheet_name: String,
    pub columns: Vec<TableColumn>,
    pub records: Vec<RawRecord>,
}

impl RecordTable {
    pub fn new(sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            ..Self::default()
        }
    }

    pub fn column(mut self, column: TableColumn) -> Self {
        self.columns.push(column);
        self
    }

    pub fn record(mut self, record: RawRecord) -> Self {
        self.records.push(record);
        self
    }
}

impl TableSource for RecordTable {
    fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    fn records(&self) -> &[RawRecord] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_defaults_to_field() {
        let col = TableColumn::new("Market");
        assert_eq!(col.header_text(), "Market");
        assert_eq!(col.header("Рынок").header_text(), "Рынок");
    }

    #[test]
    fn table_config_requires_columns() {
        let config = TableConfig {
            sheet_name: default_sheet_name(),
            columns: vec![],
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn record_table_exposes_rows() {
        let table = RecordTable::new("Sale plan")
            .column(TableColumn::new("Market"))
            .column(TableColumn::new("QTY").number())
            .record(RawRecord::new().with("Market", "CIS").with("QTY", 4));

        assert_eq!(table.sheet_name(), "Sale plan");
        assert_eq!(table.columns()[1].kind, ColumnKind::Number);
        assert_eq!(table.records().len(), 1);
    }
}
