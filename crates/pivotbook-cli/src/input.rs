//! Loading view files and record files

use anyhow::{Context, Result};
use pivotbook_core::{RawRecord, ViewConfig};
use serde::Deserialize;
use std::path::Path;

/// Accepted shapes of a JSON record file
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordFile {
    Rows(Vec<RawRecord>),
    PlanFact {
        plan: Vec<RawRecord>,
        fact: Vec<RawRecord>,
    },
    Wrapped {
        data: Vec<RawRecord>,
    },
}

/// Records to feed into one export
#[derive(Debug, Default)]
pub struct Inputs {
    pub records: Vec<RawRecord>,
    /// Actual records of a plan/fact view
    pub fact: Option<Vec<RawRecord>>,
}

pub fn load_view(path: &Path) -> Result<ViewConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read view file {}", path.display()))?;
    let config: ViewConfig = toml::from_str(&text)
        .with_context(|| format!("Failed to parse view file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid view file {}", path.display()))?;
    Ok(config)
}

/// Read the primary record file and an optional separate fact file.
///
/// A primary file of the form `{"plan": [...], "fact": [...]}` supplies both
/// sides; an explicit fact file takes precedence over its `fact` list.
pub fn load_inputs(input: &Path, fact: Option<&Path>) -> Result<Inputs> {
    let mut inputs = match read_records(input)? {
        RecordFile::Rows(records) | RecordFile::Wrapped { data: records } => Inputs {
            records,
            fact: None,
        },
        RecordFile::PlanFact { plan, fact } => Inputs {
            records: plan,
            fact: Some(fact),
        },
    };

    if let Some(path) = fact {
        let records = match read_records(path)? {
            RecordFile::Rows(records) | RecordFile::Wrapped { data: records } => records,
            RecordFile::PlanFact { fact, .. } => fact,
        };
        inputs.fact = Some(records);
    }

    tracing::debug!(
        records = inputs.records.len(),
        fact = inputs.fact.as_ref().map_or(0, Vec::len),
        "inputs loaded"
    );
    Ok(inputs)
}

fn read_records(path: &Path) -> Result<RecordFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read records from {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Expected a JSON array of records in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_file_shapes() {
        let rows: RecordFile = serde_json::from_str(r#"[{"Market": "CIS", "QTY": 3}]"#).unwrap();
        assert!(matches!(rows, RecordFile::Rows(ref r) if r.len() == 1));

        let wrapped: RecordFile =
            serde_json::from_str(r#"{"data": [{"Market": "CIS"}, {"Market": null}]}"#).unwrap();
        assert!(matches!(wrapped, RecordFile::Wrapped { ref data } if data.len() == 2));

        let both: RecordFile =
            serde_json::from_str(r#"{"plan": [{"QTY": 1}], "fact": []}"#).unwrap();
        assert!(matches!(both, RecordFile::PlanFact { ref plan, ref fact } if plan.len() == 1 && fact.is_empty()));
    }
}
