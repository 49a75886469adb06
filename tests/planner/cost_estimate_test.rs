// tests/planner/cost_estimate_test.rs
#[path = "../common/mod.rs"]
mod common;

use querywright::planner::cost::DEFAULT_ROW_COUNT;
use querywright::planner::{CostEstimate, CostEstimator, JoinPathFinder, QueryPlan, StatementBuilder};
use querywright::sql::{parse_statement, Dialect, SqlStatement};

fn estimate(plan: QueryPlan) -> CostEstimate {
    let catalog = common::catalog();
    let path = JoinPathFinder::new(&catalog).resolve(&plan).unwrap();
    let statement = StatementBuilder::new(&catalog).build(&plan, &path).unwrap();
    CostEstimator::new(&catalog).estimate(&statement)
}

#[test]
fn test_grouped_revenue_is_bounded_by_groups() {
    let est = estimate(
        QueryPlan::builder()
            .select("Company.industry")
            .select("Company.revenue")
            .group_by("Company.industry")
            .build()
            .unwrap(),
    );
    assert!(est.approximate_rows <= 20);
    assert_eq!(est.approximate_scan_bytes, 5000 * 200);
    assert!(est.stats_complete);
}

#[test]
fn test_limit_caps_rows() {
    let est = estimate(
        QueryPlan::builder()
            .select("Company.industry")
            .select("Company.revenue")
            .filter_in("Company.region", vec!["EU".into(), "NA".into()])
            .group_by("Company.industry")
            .limit(10)
            .build()
            .unwrap(),
    );
    assert_eq!(est.approximate_rows, 10);
}

#[test]
fn test_in_list_uses_distinct_count() {
    let est = estimate(
        QueryPlan::builder()
            .select("Company.name")
            .filter_in("Company.region", vec!["EU".into(), "NA".into()])
            .build()
            .unwrap(),
    );
    assert_eq!(est.approximate_rows, 3333);
}

#[test]
fn test_ungrouped_aggregate_is_one_row() {
    let est = estimate(
        QueryPlan::builder()
            .select("Person.headcount")
            .build()
            .unwrap(),
    );
    assert_eq!(est.approximate_rows, 1);
    assert_eq!(est.approximate_scan_bytes, 80_000 * 120);
}

#[test]
fn test_join_scans_every_table() {
    let est = estimate(
        QueryPlan::builder()
            .select("Person.name")
            .select("Company.name")
            .build()
            .unwrap(),
    );
    assert_eq!(est.approximate_rows, 80_000);
    assert_eq!(est.approximate_scan_bytes, 80_000 * 120 + 5000 * 200);
    assert!(est.stats_complete);
}

#[test]
fn test_missing_stats_mark_estimate_incomplete() {
    let est = estimate(
        QueryPlan::builder()
            .select("Deal.stage")
            .build()
            .unwrap(),
    );
    assert_eq!(est.approximate_rows, DEFAULT_ROW_COUNT);
    assert!(!est.stats_complete);
}

#[test]
fn test_estimate_over_parsed_text() {
    let catalog = common::catalog();
    let statement = parse_statement(
        "SELECT name FROM companies WHERE is_public = 1 OR industry = 'Energy'",
        Dialect::Sqlite,
    )
    .unwrap();
    let est = CostEstimator::new(&catalog).estimate(&statement);
    // 0.1 + 1/20 - 0.1/20
    assert_eq!(est.approximate_rows, 725);
}

#[test]
fn test_opaque_statement_estimates_to_zero() {
    let catalog = common::catalog();
    let statement: SqlStatement =
        parse_statement("DELETE FROM companies", Dialect::Sqlite).unwrap();
    assert_eq!(
        CostEstimator::new(&catalog).estimate(&statement),
        CostEstimate {
            approximate_rows: 0,
            approximate_scan_bytes: 0,
            stats_complete: false,
        }
    );
}
