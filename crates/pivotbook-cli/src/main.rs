//! pivotbook CLI - Pivot Aggregation and Spreadsheet Export
//!
//! Command-line interface for validating view files, previewing pivots, and
//! exporting them to XLSX workbooks.

mod input;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use pivotbook_core::{Renderer, ViewConfig, ViewKind, Workbook};
use pivotbook_render::{
    ExportArtifact, ExportOrchestrator, ExportSource, TextRenderer, WorkbookSerializer,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::input::Inputs;

#[derive(Parser)]
#[command(name = "pivotbook")]
#[command(author, version, about = "Pivot aggregation and spreadsheet export", long_about = None)]
struct Cli {
    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate records and write an XLSX workbook
    Export {
        #[command(flatten)]
        source: SourceArgs,

        /// Version id appended to the file name
        #[arg(long, env = "PIVOTBOOK_VERSION")]
        version: Option<u32>,

        /// Output directory or file (current directory if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the workbook as plain-text tables
    Preview {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Validate a view file
    Check {
        /// View file path
        #[arg(long, value_name = "FILE")]
        view: PathBuf,
    },
}

#[derive(clap::Args)]
struct SourceArgs {
    /// View file path
    #[arg(long, value_name = "FILE")]
    view: PathBuf,

    /// JSON record file (plan records for plan/fact views)
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// JSON record file with actual records for plan/fact views
    #[arg(long, value_name = "FILE")]
    fact: Option<PathBuf>,

    /// Date that anchors the reporting year and the YTD cutoff (default: today)
    #[arg(long, value_name = "YYYY-MM-DD", env = "PIVOTBOOK_REFERENCE_DATE")]
    reference_date: Option<NaiveDate>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match cli.command {
        Some(Commands::Export {
            source,
            version,
            output,
        }) => cmd_export(&source, version, output.as_deref()),
        Some(Commands::Preview { source }) => cmd_preview(&source),
        Some(Commands::Check { view }) => cmd_check(&view),
        None => {
            println!("pivotbook - Pivot Aggregation and Spreadsheet Export");
            println!("Run with --help for usage information");
            Ok(())
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

fn cmd_export(args: &SourceArgs, version: Option<u32>, output: Option<&Path>) -> Result<()> {
    let mut config = input::load_view(&args.view)?;
    if let Some(version) = version {
        config.export.version = Some(version);
    }
    let inputs = input::load_inputs(&args.input, args.fact.as_deref())?;
    let orchestrator = ExportOrchestrator::new(config.export.clone());

    let artifact = match &config.table {
        Some(table) => {
            let table = table.with_records(inputs.records);
            orchestrator.export_table(&table, &config.style)?
        }
        None => {
            let spec = config.grouping(reference_date(args))?;
            let source = export_source(&config, &inputs)?;
            orchestrator.export(source, &spec, &config.style)?
        }
    };

    let path = output_path(output, &artifact.file_name);
    std::fs::write(&path, &artifact.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    report(&artifact);
    println!("{}", path.display());
    Ok(())
}

fn cmd_preview(args: &SourceArgs) -> Result<()> {
    let config = input::load_view(&args.view)?;
    let inputs = input::load_inputs(&args.input, args.fact.as_deref())?;

    let workbook: Workbook = match &config.table {
        Some(table) => {
            let table = table.with_records(inputs.records);
            WorkbookSerializer::new(&config.style).serialize_table(&table)?
        }
        None => {
            let spec = config.grouping(reference_date(args))?;
            let source = export_source(&config, &inputs)?;
            let (workbook, _, issues) = ExportOrchestrator::new(config.export.clone())
                .build_workbook(source, &spec, &config.style)?;
            if !issues.is_empty() {
                eprintln!("{} record issue(s) absorbed", issues.len());
            }
            workbook
        }
    };

    print!("{}", TextRenderer::new().render(&workbook)?);
    Ok(())
}

fn cmd_check(view: &Path) -> Result<()> {
    let config = input::load_view(view)?;
    match (&config.view, &config.table) {
        (Some(schema), _) => println!(
            "OK: {} view '{}' ({} dimension(s), measure {})",
            kind_name(config.kind),
            config.export.name,
            schema.dimensions.len(),
            schema.measure
        ),
        (None, Some(table)) => println!(
            "OK: table '{}' ({} column(s))",
            table.sheet_name,
            table.columns.len()
        ),
        (None, None) => {}
    }
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

fn export_source<'a>(config: &ViewConfig, inputs: &'a Inputs) -> Result<ExportSource<'a>> {
    match config.kind {
        ViewKind::Buckets => Ok(ExportSource::Records(&inputs.records)),
        ViewKind::PlanFact => {
            let fact = inputs.fact.as_deref().context(
                "Plan/fact views need actual records: pass --fact or a {\"plan\", \"fact\"} input file",
            )?;
            Ok(ExportSource::PlanFact {
                plan: &inputs.records,
                fact,
            })
        }
    }
}

fn reference_date(args: &SourceArgs) -> NaiveDate {
    args.reference_date
        .unwrap_or_else(|| chrono::Local::now().date_naive())
}

/// An existing directory receives the suggested file name; anything else is
/// taken as the file path itself
fn output_path(output: Option<&Path>, file_name: &str) -> PathBuf {
    match output {
        Some(path) if path.is_dir() => path.join(file_name),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(file_name),
    }
}

fn report(artifact: &ExportArtifact) {
    eprintln!(
        "Exported {} row(s) on {} sheet(s), {} bytes",
        artifact.rows,
        artifact.sheets,
        artifact.bytes.len()
    );
    if !artifact.issues.is_empty() {
        eprintln!("{} record issue(s) absorbed", artifact.issues.len());
    }
}

fn kind_name(kind: ViewKind) -> &'static str {
    match kind {
        ViewKind::Buckets => "bucketed",
        ViewKind::PlanFact => "plan/fact",
    }
}
