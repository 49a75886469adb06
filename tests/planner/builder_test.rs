// tests/planner/builder_test.rs
#[path = "../common/mod.rs"]
mod common;

use querywright::catalog::ValueType;
use querywright::planner::{
    FilterOp, FilterValue, JoinPath, JoinPathFinder, PlanError, QueryPlan, StatementBuilder,
};
use querywright::sql::{Dialect, SqlStatement};
use sqlparser::parser::Parser;

const DIALECTS: [Dialect; 5] = [
    Dialect::Sqlite,
    Dialect::DuckDb,
    Dialect::Postgres,
    Dialect::Snowflake,
    Dialect::BigQuery,
];

fn reparse(sql: &str, dialect: Dialect) {
    let parser_dialect = dialect.parser_dialect();
    if let Err(e) = Parser::parse_sql(parser_dialect.as_ref(), sql) {
        panic!("{dialect} rejected rendered SQL: {e}\n{sql}");
    }
}

fn build(plan: &QueryPlan) -> Result<SqlStatement, PlanError> {
    let catalog = common::catalog();
    let path = JoinPathFinder::new(&catalog).resolve(plan).unwrap();
    StatementBuilder::new(&catalog).build(plan, &path)
}

fn build_sql(plan: QueryPlan) -> String {
    build(&plan).unwrap().to_sql(Dialect::Sqlite)
}

#[test]
fn test_revenue_by_industry() {
    let plan = QueryPlan::builder()
        .select("Company.industry")
        .select("Company.revenue")
        .group_by("Company.industry")
        .build()
        .unwrap();

    insta::assert_snapshot!(build_sql(plan), @r#"
    SELECT
      "Company"."industry" AS "industry",
      SUM("Company"."revenue") AS "revenue"
    FROM "companies" AS "Company"
    GROUP BY "Company"."industry"
    "#);
}

#[test]
fn test_grouping_is_exactly_the_plain_selections() {
    let plan = QueryPlan::builder()
        .select("Company.industry")
        .select("Company.region")
        .select("Company.revenue")
        .select("Company.company_count")
        .group_by("Company.region")
        .group_by("Company.industry")
        .build()
        .unwrap();

    let statement = build(&plan).unwrap();
    let query = statement.as_query().unwrap();
    assert_eq!(query.group_by.len(), 2);
    let sql = statement.to_sql(Dialect::Sqlite);
    assert!(sql.contains(r#"GROUP BY "Company"."industry", "Company"."region""#));
    assert!(sql.contains(r#"COUNT("Company"."id") AS "company_count""#));
}

#[test]
fn test_no_grouping_without_measures() {
    let plan = QueryPlan::builder()
        .select("Company.name")
        .select("Company.industry")
        .build()
        .unwrap();
    let statement = build(&plan).unwrap();
    assert!(statement.as_query().unwrap().group_by.is_empty());
    assert!(!statement.to_sql(Dialect::Sqlite).contains("GROUP BY"));
}

#[test]
fn test_measure_only_has_no_grouping() {
    let plan = QueryPlan::builder()
        .select("Company.revenue")
        .build()
        .unwrap();
    let statement = build(&plan).unwrap();
    assert!(statement.as_query().unwrap().group_by.is_empty());
}

#[test]
fn test_dimension_beside_measure_must_be_grouped() {
    let plan = QueryPlan::builder()
        .select("Company.industry")
        .select("Company.region")
        .select("Company.revenue")
        .group_by("Company.industry")
        .build()
        .unwrap();
    assert_eq!(
        build(&plan),
        Err(PlanError::AmbiguousAggregation("Company.region".into()))
    );
}

#[test]
fn test_grouping_rejections() {
    let unselected = QueryPlan::builder()
        .select("Company.revenue")
        .group_by("Company.industry")
        .build()
        .unwrap();
    assert_eq!(
        build(&unselected),
        Err(PlanError::GroupingNotSelected("Company.industry".into()))
    );

    let measure = QueryPlan::builder()
        .select("Company.industry")
        .select("Company.revenue")
        .group_by("Company.revenue")
        .build()
        .unwrap();
    assert_eq!(
        build(&measure),
        Err(PlanError::MeasureInGroupBy("Company.revenue".into()))
    );
}

#[test]
fn test_order_must_be_selected() {
    let plan = QueryPlan::builder()
        .select("Company.name")
        .order_by("Company.industry", false)
        .build()
        .unwrap();
    assert_eq!(
        build(&plan),
        Err(PlanError::OrderNotSelected("Company.industry".into()))
    );
}

#[test]
fn test_order_and_limit() {
    let plan = QueryPlan::builder()
        .select("Company.industry")
        .select("Company.revenue")
        .group_by("Company.industry")
        .order_by("Company.revenue", true)
        .limit(10)
        .build()
        .unwrap();
    let sql = build_sql(plan);
    assert!(sql.contains(r#"ORDER BY SUM("Company"."revenue") DESC"#));
    assert!(sql.ends_with("LIMIT 10"));
}

#[test]
fn test_filter_type_checks() {
    let on_measure = QueryPlan::builder()
        .select("Company.name")
        .filter("Company.revenue", FilterOp::Gt, 10i64)
        .build()
        .unwrap();
    assert_eq!(
        build(&on_measure),
        Err(PlanError::FilterOnMeasure("Company.revenue".into()))
    );

    let mismatch = QueryPlan::builder()
        .select("Company.name")
        .filter("Company.id", FilterOp::Eq, "seven")
        .build()
        .unwrap();
    assert!(matches!(
        build(&mismatch),
        Err(PlanError::TypeMismatch {
            expected: ValueType::Number,
            ..
        })
    ));

    let bad_date = QueryPlan::builder()
        .select("Company.name")
        .filter("Company.founded", FilterOp::Gte, "01/02/2000")
        .build()
        .unwrap();
    assert!(matches!(
        build(&bad_date),
        Err(PlanError::TypeMismatch {
            expected: ValueType::Date,
            ..
        })
    ));

    let like_number = QueryPlan::builder()
        .select("Company.name")
        .filter("Company.id", FilterOp::Like, "1%")
        .build()
        .unwrap();
    assert!(matches!(
        build(&like_number),
        Err(PlanError::OperatorNotApplicable {
            value_type: ValueType::Number,
            ..
        })
    ));

    let range_on_bool = QueryPlan::builder()
        .select("Company.name")
        .filter("Company.is_public", FilterOp::Lt, true)
        .build()
        .unwrap();
    assert!(matches!(
        build(&range_on_bool),
        Err(PlanError::OperatorNotApplicable { .. })
    ));
}

#[test]
fn test_domain_is_enforced() {
    let plan = QueryPlan::builder()
        .select("Company.name")
        .filter_in(
            "Company.region",
            vec![FilterValue::from("EU"), FilterValue::from("LATAM")],
        )
        .build()
        .unwrap();
    assert_eq!(
        build(&plan),
        Err(PlanError::ValueOutsideDomain {
            field: "Company.region".into(),
            value: "LATAM".into()
        })
    );

    // LIKE patterns are not domain values.
    let like = QueryPlan::builder()
        .select("Company.name")
        .filter("Company.region", FilterOp::Like, "E%")
        .build()
        .unwrap();
    assert!(build(&like).is_ok());
}

#[test]
fn test_filters_render() {
    let plan = QueryPlan::builder()
        .select("Company.name")
        .filter_in(
            "Company.region",
            vec![FilterValue::from("EU"), FilterValue::from("NA")],
        )
        .filter_null("Company.founded", true)
        .filter("Company.founded", FilterOp::Gte, "2000-01-01")
        .filter("Company.is_public", FilterOp::Eq, true)
        .build()
        .unwrap();
    let sql = build_sql(plan);
    assert!(sql.contains(r#""Company"."region" IN ('EU', 'NA')"#));
    assert!(sql.contains(r#""Company"."founded_on" IS NOT NULL"#));
    assert!(sql.contains(r#""Company"."founded_on" >= '2000-01-01'"#));
    assert!(sql.contains(" AND "));
}

#[test]
fn test_unknown_field() {
    let plan = QueryPlan::builder()
        .select("Company.ticker")
        .build()
        .unwrap();
    assert_eq!(
        build(&plan),
        Err(PlanError::UnknownField {
            entity: "Company".into(),
            field: "ticker".into()
        })
    );
}

#[test]
fn test_path_must_cover_plan() {
    let catalog = common::catalog();
    let plan = QueryPlan::builder()
        .select("Person.name")
        .select("Company.name")
        .build()
        .unwrap();
    assert_eq!(
        StatementBuilder::new(&catalog).build(&plan, &JoinPath::single("Person")),
        Err(PlanError::EntityNotInPath("Company".into()))
    );
}

#[test]
fn test_join_with_colliding_names() {
    let plan = QueryPlan::builder()
        .select("Person.name")
        .select("Company.name")
        .select("Person.headcount")
        .group_by("Person.name")
        .group_by("Company.name")
        .build()
        .unwrap();
    let sql = build_sql(plan);

    assert!(sql.contains(r#"AS "person_name""#));
    assert!(sql.contains(r#"AS "company_name""#));
    assert!(sql.contains(r#"COUNT(DISTINCT "Person"."id") AS "headcount""#));
    assert!(sql.contains(r#"INNER JOIN "#));
    assert!(sql.contains(r#""Person"."company_id" = "Company"."id""#)
        || sql.contains(r#""Company"."id" = "Person"."company_id""#));
}

#[test]
fn test_rendered_sql_parses_in_every_dialect() {
    let plan = QueryPlan::builder()
        .select("Company.industry")
        .select("Deal.stage")
        .select("Deal.amount")
        .select("Person.headcount")
        .filter("Deal.closed_on", FilterOp::Gte, "2024-01-01")
        .filter("Company.is_public", FilterOp::Eq, false)
        .group_by("Company.industry")
        .group_by("Deal.stage")
        .order_by("Deal.amount", true)
        .limit(50)
        .build()
        .unwrap();
    let statement = build(&plan).unwrap();

    for dialect in DIALECTS {
        reparse(&statement.to_sql(dialect), dialect);
    }
}
