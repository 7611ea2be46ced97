//! Integration tests for plan vs. fact pivots
//!
//! These tests verify the YTD window, diff identity and key union of merged
//! plan/fact row sets.

use chrono::NaiveDate;
use pivotbook_core::{
    DimensionField, GroupingSpec, PivotError, PivotTable, RawRecord, TemporalSource, ViewSchema,
};
use pivotbook_engine::PivotBuilder;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn view() -> ViewSchema {
    ViewSchema::new("QTY")
        .dimension(DimensionField::new("Market"))
        .temporal(TemporalSource::year_month("YearNum", "MonthNum"))
}

fn entry(market: &str, qty: Decimal, year: i32, month: i32) -> RawRecord {
    RawRecord::new()
        .with("Market", market)
        .with("QTY", qty.to_string())
        .with("YearNum", year)
        .with("MonthNum", month)
}

fn every_month(market: &str, year: i32, qty: Decimal) -> Vec<RawRecord> {
    (1..=12).map(|m| entry(market, qty, year, m)).collect()
}

fn value(table: &PivotTable, row: usize, id: &str) -> Decimal {
    table.value(&table.rows[row], id).expect("column exists")
}

/// Test: Lead time 2 in September covers January through November
#[test]
fn ytd_includes_months_up_to_lead_shifted_cutoff() {
    let spec = GroupingSpec::new(view(), date(2024, 9, 15)).plan_vs_fact(2, None);
    let plan = every_month("Russia", 2024, dec!(10));
    let fact = every_month("Russia", 2024, dec!(7));

    let table = PivotBuilder::new(&spec)
        .build_plan_fact(&plan, &fact)
        .expect("Should build")
        .table;

    assert_eq!(value(&table, 0, "ytd_plan"), dec!(110));
    assert_eq!(value(&table, 0, "ytd_fact"), dec!(77));
    assert_eq!(value(&table, 0, "ytd_diff"), dec!(-33));
    assert_eq!(value(&table, 0, "total_plan"), dec!(120));
    assert_eq!(value(&table, 0, "total_fact"), dec!(84));
    assert_eq!(value(&table, 0, "total_diff"), dec!(-36));
}

/// Test: An earlier reporting year is fully inside the YTD window
#[test]
fn earlier_reporting_year_is_fully_included() {
    let spec = GroupingSpec::new(view(), date(2024, 9, 15)).plan_vs_fact(2, Some(2023));
    let plan = every_month("Russia", 2023, dec!(1));
    let table = PivotBuilder::new(&spec)
        .build_plan_fact(&plan, &[])
        .unwrap()
        .table;
    assert_eq!(value(&table, 0, "ytd_plan"), dec!(12));
}

/// Test: A later reporting year contributes nothing to YTD
#[test]
fn later_reporting_year_is_excluded() {
    let spec = GroupingSpec::new(view(), date(2024, 9, 15)).plan_vs_fact(2, Some(2025));
    let plan = every_month("Russia", 2025, dec!(1));
    let table = PivotBuilder::new(&spec)
        .build_plan_fact(&plan, &[])
        .unwrap()
        .table;
    assert_eq!(value(&table, 0, "ytd_plan"), dec!(0));
    assert_eq!(value(&table, 0, "total_plan"), dec!(12));
}

/// Test: diff == fact - plan for every month, the totals and YTD
#[test]
fn diff_identity_everywhere() {
    let spec = GroupingSpec::new(view(), date(2024, 6, 1)).plan_vs_fact(1, None);
    let plan = vec![
        entry("Russia", dec!(0.1), 2024, 1),
        entry("Russia", dec!(0.2), 2024, 2),
        entry("CIS", dec!(1.3), 2024, 7),
    ];
    let fact = vec![
        entry("Russia", dec!(0.3), 2024, 1),
        entry("CIS", dec!(0.7), 2024, 7),
        entry("Europe", dec!(5), 2024, 12),
    ];
    let table = PivotBuilder::new(&spec)
        .build_plan_fact(&plan, &fact)
        .unwrap()
        .table;

    let mut prefixes = vec!["total".to_string(), "ytd".to_string()];
    prefixes.extend((0..12).map(|m| format!("month_{m}")));
    for row in table.rows.iter().chain([&table.grand_total]) {
        for prefix in &prefixes {
            let get = |suffix: &str| {
                table
                    .value(row, &format!("{prefix}_{suffix}"))
                    .expect("triplet column")
            };
            assert_eq!(get("diff"), get("fact") - get("plan"), "{prefix}");
        }
    }
}

/// Test: Keys from both sides appear; rows sort by total plan
#[test]
fn union_of_keys_sorted_by_plan() {
    let spec = GroupingSpec::new(view(), date(2024, 6, 1)).plan_vs_fact(0, None);
    let plan = vec![
        entry("CIS", dec!(3), 2024, 1),
        entry("Russia", dec!(8), 2024, 1),
    ];
    let fact = vec![
        entry("europe", dec!(50), 2024, 1),
        entry("russia", dec!(9), 2024, 1),
    ];
    let table = PivotBuilder::new(&spec)
        .build_plan_fact(&plan, &fact)
        .unwrap()
        .table;

    let markets: Vec<&str> = table.rows.iter().map(|r| r.labels[0].as_str()).collect();
    assert_eq!(markets, vec!["Russia", "CIS", "europe"]);
    assert_eq!(value(&table, 0, "month_0_fact"), dec!(9));
    assert_eq!(value(&table, 2, "month_0_plan"), dec!(0));
    assert_eq!(
        table.value(&table.grand_total, "total_fact"),
        Some(dec!(59))
    );
}

/// Test: Fact rows may carry their measure in a different field
#[test]
fn fact_measure_field_override() {
    let spec = GroupingSpec::new(view(), date(2024, 6, 1))
        .plan_vs_fact(0, None)
        .fact_measure("FactQty");
    let plan = vec![entry("Russia", dec!(4), 2024, 3)];
    let fact = vec![RawRecord::new()
        .with("Market", "Russia")
        .with("FactQty", 6)
        .with("YearNum", 2024)
        .with("MonthNum", 3)];
    let table = PivotBuilder::new(&spec)
        .build_plan_fact(&plan, &fact)
        .unwrap()
        .table;
    assert_eq!(value(&table, 0, "month_2_diff"), dec!(2));
}

/// Test: Values outside the reporting year do not enter any plan/fact column
#[test]
fn out_of_window_values_are_ignored() {
    let spec = GroupingSpec::new(view(), date(2024, 6, 1)).plan_vs_fact(0, None);
    let plan = vec![
        entry("Russia", dec!(4), 2024, 3),
        entry("Russia", dec!(100), 2023, 3),
        RawRecord::new().with("Market", "Russia").with("QTY", 1000),
    ];
    let table = PivotBuilder::new(&spec)
        .build_plan_fact(&plan, &[])
        .unwrap()
        .table;
    assert_eq!(value(&table, 0, "total_plan"), dec!(4));
}

/// Test: No plan and no fact rows is an empty result
#[test]
fn empty_plan_and_fact_is_refused() {
    let spec = GroupingSpec::new(view(), date(2024, 6, 1)).plan_vs_fact(0, None);
    let err = PivotBuilder::new(&spec)
        .build_plan_fact(&[], &[])
        .unwrap_err();
    assert!(matches!(err, PivotError::EmptyResult));
}
