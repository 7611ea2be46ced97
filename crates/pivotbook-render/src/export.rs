//! Export orchestration
//!
//! Single entry point from raw records to workbook bytes. The stages run in a
//! fixed order and none is skipped:
//!
//! ```text
//! normalize → bucket → aggregate → (merge) → grand total → assemble → serialize → render
//! ```
//!
//! The orchestrator holds no state between calls; identical inputs give
//! identical workbooks.

use pivotbook_core::{
    ExportError, ExportName, GroupingSpec, MalformedRecord, RawRecord, Renderer, StyleOptions,
    TableSource, Workbook,
};
use pivotbook_engine::PivotBuilder;

use crate::excel::XlsxRenderer;
use crate::serialize::WorkbookSerializer;

/// Records to export
#[derive(Clone, Copy, Debug)]
pub enum ExportSource<'a> {
    /// One record set, bucketed by time
    Records(&'a [RawRecord]),
    /// Planned and actual record sets, merged month by month
    PlanFact {
        plan: &'a [RawRecord],
        fact: &'a [RawRecord],
    },
}

/// Rendered export ready to be written or downloaded
#[derive(Clone, Debug)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub file_name: String,
    /// Pivot or table body rows, excluding headers and totals
    pub rows: usize,
    pub sheets: usize,
    /// Record anomalies absorbed during normalization
    pub issues: Vec<MalformedRecord>,
}

/// Drives the pipeline for one logical export
#[derive(Clone, Debug)]
pub struct ExportOrchestrator<R = XlsxRenderer> {
    name: ExportName,
    renderer: R,
}

impl ExportOrchestrator<XlsxRenderer> {
    pub fn new(name: ExportName) -> Self {
        Self {
            name,
            renderer: XlsxRenderer::new(),
        }
    }
}

impl<R> ExportOrchestrator<R>
where
    R: Renderer<Output = Vec<u8>>,
{
    pub fn with_renderer(name: ExportName, renderer: R) -> Self {
        Self { name, renderer }
    }

    pub fn file_name(&self) -> String {
        self.name.file_name()
    }

    /// Run every stage up to the workbook model
    pub fn build_workbook(
        &self,
        source: ExportSource<'_>,
        spec: &GroupingSpec,
        style: &StyleOptions,
    ) -> Result<(Workbook, usize, Vec<MalformedRecord>), ExportError> {
        let builder = PivotBuilder::new(spec);
        let outcome = match source {
            ExportSource::Records(records) => builder.build(records)?,
            ExportSource::PlanFact { plan, fact } => builder.build_plan_fact(plan, fact)?,
        };
        let workbook = WorkbookSerializer::new(style).serialize(&outcome.table)?;
        Ok((workbook, outcome.table.rows.len(), outcome.issues))
    }

    /// Run the whole pipeline and render the workbook with its suggested file name
    pub fn export(
        &self,
        source: ExportSource<'_>,
        spec: &GroupingSpec,
        style: &StyleOptions,
    ) -> Result<ExportArtifact, ExportError> {
        let (workbook, rows, issues) = self.build_workbook(source, spec, style)?;
        self.finish(&workbook, rows, issues)
    }

    /// Export a result set as a plain table
    pub fn export_table(
        &self,
        source: &dyn TableSource,
        style: &StyleOptions,
    ) -> Result<ExportArtifact, ExportError> {
        let workbook = WorkbookSerializer::new(style).serialize_table(source)?;
        self.finish(&workbook, source.records().len(), Vec::new())
    }

    fn finish(
        &self,
        workbook: &Workbook,
        rows: usize,
        issues: Vec<MalformedRecord>,
    ) -> Result<ExportArtifact, ExportError> {
        let bytes = self.renderer.render(workbook)?;
        let file_name = self.file_name();
        tracing::info!(
            file = %file_name,
            rows,
            sheets = workbook.sheets.len(),
            bytes = bytes.len(),
            issues = issues.len(),
            "export complete"
        );
        Ok(ExportArtifact {
            bytes,
            file_name,
            rows,
            sheets: workbook.sheets.len(),
            issues,
        })
    }
}
