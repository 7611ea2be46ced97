//! CLI integration tests
//!
//! These tests run the `pivotbook` binary against view and record files in a
//! temporary directory.
//!
//! ## Exit Code Contract
//!
//! | Exit Code | Meaning |
//! |-----------|---------|
//! | 0 | Success |
//! | 1 | Invalid view file, unreadable input, or nothing to export |

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const MARKET_VIEW: &str = r#"
kind = "buckets"
reference_date = "2024-06-01"

[export]
name = "orders"

[view]
measure = "QTY"
temporal = { kind = "year_month", year_field = "Year", month_field = "Month" }

[[view.dimensions]]
field = "LargeGroup"
label = "Large Group"

[[view.dimensions]]
field = "Market"
"#;

const MARKET_ROWS: &str = r#"[
  {"LargeGroup": "A", "Market": "Russia", "QTY": 10, "Year": 2024, "Month": 1},
  {"LargeGroup": "A", "Market": "Russia", "QTY": 5, "Year": 2024, "Month": 2},
  {"LargeGroup": "A", "Market": "CIS", "QTY": 3, "Year": 2024, "Month": 1}
]"#;

const PLAN_FACT_VIEW: &str = r#"
kind = "plan_fact"

[export]
name = "plan_fact"

[plan_fact]
lead_time_months = 2

[view]
measure = "QTY"
temporal = { kind = "year_month", year_field = "YearNum", month_field = "MonthNum" }

[[view.dimensions]]
field = "Market"
"#;

const TABLE_VIEW: &str = r#"
[export]
name = "sale_plan"
version = 7

[table]
sheet_name = "Sale plan"

[[table.columns]]
field = "Market"

[[table.columns]]
field = "QTY"
header = "Quantity"
kind = "number"
"#;

fn pivotbook() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pivotbook"))
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Should write fixture");
    path
}

fn run(args: &[&str], cwd: &Path) -> Output {
    pivotbook()
        .args(args)
        .current_dir(cwd)
        .env_remove("PIVOTBOOK_VERSION")
        .env_remove("PIVOTBOOK_REFERENCE_DATE")
        .output()
        .expect("failed to execute pivotbook")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// =============================================================================
// export
// =============================================================================

/// Test: Export writes a workbook named after the view into the output dir
#[test]
fn export_writes_workbook() {
    let dir = TempDir::new().unwrap();
    write(&dir, "view.toml", MARKET_VIEW);
    write(&dir, "rows.json", MARKET_ROWS);
    let out = dir.path().join("out");
    std::fs::create_dir(&out).unwrap();

    let output = run(
        &[
            "export",
            "--view",
            "view.toml",
            "--input",
            "rows.json",
            "-o",
            out.to_str().unwrap(),
        ],
        dir.path(),
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let expected = out.join("orders.xlsx");
    assert_eq!(stdout(&output).trim(), expected.display().to_string());
    let bytes = std::fs::read(&expected).expect("Should have written workbook");
    assert_eq!(&bytes[..2], b"PK");
}

/// Test: The version flag lands in the suggested file name
#[test]
fn export_version_flag() {
    let dir = TempDir::new().unwrap();
    write(&dir, "view.toml", MARKET_VIEW);
    write(&dir, "rows.json", MARKET_ROWS);

    let output = run(
        &[
            "export",
            "--view",
            "view.toml",
            "--input",
            "rows.json",
            "--version",
            "12",
        ],
        dir.path(),
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(dir.path().join("orders_v12.xlsx").exists());
}

/// Test: An empty record file exits non-zero with "nothing to export"
#[test]
fn export_empty_input_fails() {
    let dir = TempDir::new().unwrap();
    write(&dir, "view.toml", MARKET_VIEW);
    write(&dir, "rows.json", "[]");

    let output = run(
        &["export", "--view", "view.toml", "--input", "rows.json"],
        dir.path(),
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).to_lowercase().contains("nothing to export"));
    assert!(!dir.path().join("orders.xlsx").exists());
}

/// Test: Plan/fact views without actual records are refused
#[test]
fn plan_fact_requires_fact_records() {
    let dir = TempDir::new().unwrap();
    write(&dir, "view.toml", PLAN_FACT_VIEW);
    write(
        &dir,
        "plan.json",
        r#"[{"Market": "Russia", "QTY": 10, "YearNum": 2024, "MonthNum": 1}]"#,
    );

    let output = run(
        &["export", "--view", "view.toml", "--input", "plan.json"],
        dir.path(),
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("--fact"));
}

/// Test: Plan/fact export accepts a separate fact file
#[test]
fn plan_fact_export_with_fact_file() {
    let dir = TempDir::new().unwrap();
    write(&dir, "view.toml", PLAN_FACT_VIEW);
    write(
        &dir,
        "plan.json",
        r#"[{"Market": "Russia", "QTY": 10, "YearNum": 2024, "MonthNum": 1}]"#,
    );
    write(
        &dir,
        "fact.json",
        r#"{"data": [{"Market": "Russia", "QTY": 12, "YearNum": 2024, "MonthNum": 1}]}"#,
    );

    let output = run(
        &[
            "export",
            "--view",
            "view.toml",
            "--input",
            "plan.json",
            "--fact",
            "fact.json",
            "--reference-date",
            "2024-09-15",
        ],
        dir.path(),
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(dir.path().join("plan_fact.xlsx").exists());
}

/// Test: Table views export their records as a plain sheet
#[test]
fn table_export() {
    let dir = TempDir::new().unwrap();
    write(&dir, "view.toml", TABLE_VIEW);
    write(
        &dir,
        "rows.json",
        r#"[{"Market": "Russia", "QTY": 1200}, {"Market": "CIS"}]"#,
    );

    let output = run(
        &["export", "--view", "view.toml", "--input", "rows.json"],
        dir.path(),
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(dir.path().join("sale_plan_v7.xlsx").exists());
}

// =============================================================================
// preview
// =============================================================================

/// Test: Preview prints both sheets with the grand total
#[test]
fn preview_prints_sheets() {
    let dir = TempDir::new().unwrap();
    write(&dir, "view.toml", MARKET_VIEW);
    write(&dir, "rows.json", MARKET_ROWS);

    let output = run(
        &["preview", "--view", "view.toml", "--input", "rows.json"],
        dir.path(),
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("== Grouped =="));
    assert!(text.contains("== Flat =="));
    let total = text
        .lines()
        .find(|line| line.starts_with("Grand Total"))
        .expect("Should have a grand total line");
    assert!(total.contains("18"));
    assert!(text.contains("  Russia"));
}

// =============================================================================
// check
// =============================================================================

/// Test: A valid view file passes the check
#[test]
fn check_valid_view() {
    let dir = TempDir::new().unwrap();
    write(&dir, "view.toml", MARKET_VIEW);

    let output = run(&["check", "--view", "view.toml"], dir.path());
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("2 dimension(s)"));
}

/// Test: A view without dimensions is rejected
#[test]
fn check_rejects_view_without_dimensions() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "view.toml",
        r#"
[view]
measure = "QTY"
"#,
    );

    let output = run(&["check", "--view", "view.toml"], dir.path());
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Invalid view file"));
}

/// Test: Lead times beyond a year are rejected
#[test]
fn check_rejects_long_lead_time() {
    let dir = TempDir::new().unwrap();
    let view = PLAN_FACT_VIEW.replace("lead_time_months = 2", "lead_time_months = 13");
    write(&dir, "view.toml", &view);

    let output = run(&["check", "--view", "view.toml"], dir.path());
    assert!(!output.status.success());
}

/// Test: Malformed TOML is reported with the file path
#[test]
fn check_reports_parse_errors() {
    let dir = TempDir::new().unwrap();
    write(&dir, "view.toml", "kind = [");

    let output = run(&["check", "--view", "view.toml"], dir.path());
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Failed to parse view file"));
}
