// tests/security/validator_test.rs
#[path = "../common/mod.rs"]
mod common;

use querywright::security::{PolicyViolation, SecurityPolicy, SecurityValidator};
use querywright::sql::{parse_statement, Dialect, SqlStatement, StatementKind, TableRef};

fn parse(sql: &str) -> SqlStatement {
    parse_statement(sql, Dialect::Sqlite).unwrap()
}

fn validate(policy: &SecurityPolicy, sql: &str) -> Result<SqlStatement, PolicyViolation> {
    SecurityValidator::new(policy)
        .validate(&parse(sql))
        .map(|v| v.into_inner())
}

#[test]
fn test_every_non_select_kind_is_rejected() {
    let policy = common::policy();
    let validator = SecurityValidator::new(&policy);

    for kind in StatementKind::ALL {
        if kind == StatementKind::Select {
            continue;
        }
        let statement = SqlStatement::Opaque {
            kind,
            tables: vec![TableRef::new("companies")],
            text: String::new(),
        };
        assert_eq!(
            validator.validate(&statement).unwrap_err(),
            PolicyViolation::StatementKind(kind)
        );
    }
}

#[test]
fn test_write_and_ddl_text_is_rejected_by_kind() {
    let policy = common::policy();
    for (sql, kind) in [
        ("INSERT INTO companies (id) VALUES (9)", StatementKind::Insert),
        ("UPDATE companies SET revenue = 0", StatementKind::Update),
        ("DELETE FROM companies", StatementKind::Delete),
        ("DROP TABLE companies", StatementKind::Drop),
        ("CREATE TABLE audit (id INTEGER)", StatementKind::Create),
        ("ALTER TABLE companies RENAME TO c2", StatementKind::Alter),
    ] {
        assert_eq!(
            validate(&policy, sql),
            Err(PolicyViolation::StatementKind(kind)),
            "{sql}"
        );
    }
}

#[test]
fn test_table_allowlist() {
    let policy = SecurityPolicy::default()
        .with_allowed_tables(["companies"])
        .with_max_rows(100, true);

    assert!(validate(&policy, "SELECT name FROM COMPANIES LIMIT 5").is_ok());
    assert_eq!(
        validate(
            &policy,
            "SELECT c.name FROM companies c INNER JOIN people p ON p.company_id = c.id LIMIT 5"
        ),
        Err(PolicyViolation::TableNotAllowed("people".into()))
    );

    let empty = SecurityPolicy::default();
    assert_eq!(
        validate(&empty, "SELECT name FROM companies LIMIT 5"),
        Err(PolicyViolation::TableNotAllowed("companies".into()))
    );
}

#[test]
fn test_denied_and_allowed_columns() {
    let policy = common::policy().deny_column("companies", "revenue");

    assert!(validate(&policy, "SELECT name FROM companies LIMIT 5").is_ok());
    assert_eq!(
        validate(&policy, "SELECT SUM(Revenue) FROM companies"),
        Err(PolicyViolation::ColumnNotAllowed {
            table: "companies".into(),
            column: "Revenue".into()
        })
    );
    // Filters read columns too.
    assert!(matches!(
        validate(&policy, "SELECT name FROM companies WHERE revenue > 10 LIMIT 5"),
        Err(PolicyViolation::ColumnNotAllowed { .. })
    ));

    let policy = common::policy().allow_columns("people", ["id", "name"]);
    assert!(validate(&policy, "SELECT name FROM people LIMIT 5").is_ok());
    assert!(matches!(
        validate(&policy, "SELECT title FROM people LIMIT 5"),
        Err(PolicyViolation::ColumnNotAllowed { .. })
    ));
}

#[test]
fn test_wildcard_requires_unrestricted_table() {
    let open = common::policy();
    assert!(validate(&open, "SELECT * FROM people LIMIT 5").is_ok());

    let restricted = common::policy().deny_column("people", "title");
    assert_eq!(
        validate(&restricted, "SELECT * FROM people LIMIT 5"),
        Err(PolicyViolation::ColumnNotAllowed {
            table: "people".into(),
            column: "*".into()
        })
    );
}

#[test]
fn test_limit_is_clamped() {
    let policy = common::policy().with_max_rows(100, true);
    let validator = SecurityValidator::new(&policy);

    let within = validator
        .validate(&parse("SELECT name FROM companies LIMIT 100"))
        .unwrap();
    assert!(!within.was_clamped());
    assert_eq!(within.statement().limit(), Some(100));

    let over = validator
        .validate(&parse("SELECT name FROM companies LIMIT 5000"))
        .unwrap();
    assert!(over.was_clamped());
    assert_eq!(over.statement().limit(), Some(100));

    let unbounded = validator
        .validate(&parse("SELECT name FROM companies"))
        .unwrap();
    assert!(unbounded.was_clamped());
    assert!(unbounded
        .statement()
        .to_sql(Dialect::Sqlite)
        .ends_with("LIMIT 100"));
}

#[test]
fn test_limit_is_rejected_without_clamping() {
    let policy = common::policy().with_max_rows(100, false);
    assert_eq!(
        validate(&policy, "SELECT name FROM companies LIMIT 101"),
        Err(PolicyViolation::RowLimitExceeded {
            requested: 101,
            max: 100
        })
    );
    assert_eq!(
        validate(&policy, "SELECT name FROM companies"),
        Err(PolicyViolation::UnboundedRows { max: 100 })
    );
}

#[test]
fn test_first_failing_check_is_reported() {
    let policy = SecurityPolicy::default()
        .with_allowed_tables(["companies"])
        .deny_column("companies", "revenue")
        .with_max_rows(10, false);

    // Kind before tables.
    assert!(matches!(
        validate(&policy, "DELETE FROM people"),
        Err(PolicyViolation::StatementKind(_))
    ));
    // Tables before columns.
    assert!(matches!(
        validate(
            &policy,
            "SELECT c.revenue FROM companies c INNER JOIN people p ON p.company_id = c.id"
        ),
        Err(PolicyViolation::TableNotAllowed(_))
    ));
    // Columns before limit.
    assert!(matches!(
        validate(&policy, "SELECT revenue FROM companies"),
        Err(PolicyViolation::ColumnNotAllowed { .. })
    ));
    assert!(matches!(
        validate(&policy, "SELECT name FROM companies"),
        Err(PolicyViolation::UnboundedRows { .. })
    ));
}

#[test]
fn test_compiled_statements_pass_the_demo_policy() {
    let catalog = common::catalog();
    let policy = common::policy();
    let proposal = querywright::planner::PlanProposal::from_json(include_str!(
        "../../demos/plan.json"
    ))
    .unwrap();
    let output = querywright::compile::compile_plan(
        &catalog,
        &policy,
        &proposal,
        querywright::compile::CompileOptions::default(),
    )
    .unwrap();
    assert!(!output.statement.was_clamped());
    assert_eq!(output.statement.statement().limit(), Some(10));
}

#[test]
fn test_schema_qualified_table_needs_qualified_entry() {
    let policy = SecurityPolicy::default()
        .with_allowed_tables(["companies", "analytics.people"])
        .with_max_rows(100, true);

    assert_eq!(
        validate(&policy, "SELECT industry FROM secret_db.companies LIMIT 5"),
        Err(PolicyViolation::TableNotAllowed("secret_db.companies".into()))
    );
    assert_eq!(
        validate(&policy, "SELECT name FROM people LIMIT 5"),
        Err(PolicyViolation::TableNotAllowed("people".into()))
    );
    assert!(validate(&policy, "SELECT p.name FROM analytics.people p LIMIT 5").is_ok());
}

#[test]
fn test_bare_column_rule_applies_in_every_schema() {
    let policy = SecurityPolicy::default()
        .with_allowed_tables(["archive.companies"])
        .deny_column("companies", "revenue")
        .with_max_rows(100, true);

    assert_eq!(
        validate(&policy, "SELECT c.revenue FROM archive.companies c LIMIT 5"),
        Err(PolicyViolation::ColumnNotAllowed {
            table: "archive.companies".into(),
            column: "revenue".into()
        })
    );
}

#[test]
fn test_unknown_functions_are_rejected() {
    let policy = common::policy();

    assert_eq!(
        validate(&policy, "SELECT pg_read_file('/etc/passwd') FROM companies LIMIT 1"),
        Err(PolicyViolation::FunctionNotAllowed("PG_READ_FILE".into()))
    );
    assert_eq!(
        validate(
            &policy,
            "SELECT industry FROM companies WHERE LOWER(name) = load_extension('x') LIMIT 1"
        ),
        Err(PolicyViolation::FunctionNotAllowed("LOAD_EXTENSION".into()))
    );
    assert!(validate(
        &policy,
        "SELECT LOWER(industry), ROUND(SUM(revenue)) FROM companies GROUP BY LOWER(industry) LIMIT 5"
    )
    .is_ok());
}

#[test]
fn test_policy_can_permit_extra_functions() {
    let policy = common::policy().allow_functions(["substr"]);
    assert!(validate(&policy, "SELECT SUBSTR(name, 1, 3) FROM companies LIMIT 5").is_ok());
}

#[test]
fn test_reformulated_function_call_is_rejected() {
    use querywright::sql::expr::{func, table_col};
    use querywright::sql::Query;

    let policy = common::policy();
    let statement: SqlStatement = Query::new()
        .select(vec![func("READFILE", vec![table_col("Company", "name")])])
        .from(TableRef::new("companies").with_alias("Company"))
        .limit(5)
        .into();

    assert_eq!(
        SecurityValidator::new(&policy).validate(&statement).unwrap_err(),
        PolicyViolation::FunctionNotAllowed("READFILE".into())
    );
}
