// tests/sql/parse_test.rs
use querywright::sql::{parse_statement, Dialect, Expr, ParseError, SqlStatement, StatementKind};

fn kind_of(sql: &str) -> StatementKind {
    parse_statement(sql, Dialect::Sqlite).unwrap().kind()
}

#[test]
fn test_statement_kinds() {
    let cases = [
        ("SELECT 1", StatementKind::Select),
        ("INSERT INTO companies (id) VALUES (1)", StatementKind::Insert),
        ("UPDATE companies SET name = 'x'", StatementKind::Update),
        ("DELETE FROM companies WHERE id = 1", StatementKind::Delete),
        ("CREATE TABLE t (id INTEGER)", StatementKind::Create),
        ("CREATE VIEW v AS SELECT 1", StatementKind::Create),
        ("ALTER TABLE companies ADD COLUMN x TEXT", StatementKind::Alter),
        ("DROP TABLE companies", StatementKind::Drop),
        ("PRAGMA user_version", StatementKind::Other),
    ];
    for (sql, kind) in cases {
        assert_eq!(kind_of(sql), kind, "{sql}");
    }

    assert_eq!(
        parse_statement("TRUNCATE TABLE companies", Dialect::Postgres)
            .unwrap()
            .kind(),
        StatementKind::Truncate
    );
}

#[test]
fn test_write_statements_keep_their_tables() {
    let statement = parse_statement("DELETE FROM people WHERE id = 3", Dialect::Sqlite).unwrap();
    assert!(statement.as_query().is_none());
    assert_eq!(statement.referenced_tables(), vec!["people"]);
    assert!(statement.referenced_columns().is_empty());
}

#[test]
fn test_opaque_text_is_preserved() {
    let statement = parse_statement("  DROP TABLE companies  ", Dialect::Sqlite).unwrap();
    assert!(matches!(&statement, SqlStatement::Opaque { .. }));
    assert_eq!(statement.to_sql(Dialect::Sqlite), "DROP TABLE companies");
}

#[test]
fn test_lowering_covers_common_shapes() {
    let statement = parse_statement(
        "WITH big AS (SELECT id, revenue FROM companies WHERE revenue > 100)
         SELECT c.name, COUNT(DISTINCT p.id) AS staff
         FROM companies AS c
         LEFT JOIN people p ON p.company_id = c.id
         WHERE c.industry IN ('Energy', 'Software')
           AND c.founded_on BETWEEN '2000-01-01' AND '2020-12-31'
           AND NOT c.name LIKE 'A%'
         GROUP BY c.name
         ORDER BY staff DESC
         LIMIT 5",
        Dialect::Sqlite,
    )
    .unwrap();

    let query = statement.as_query().unwrap();
    assert_eq!(query.with.len(), 1);
    assert_eq!(query.joins.len(), 1);
    assert_eq!(query.group_by.len(), 1);
    assert_eq!(query.limit, Some(5));
    assert!(matches!(
        &query.select[1].expr,
        Expr::Function { name, distinct: true, .. } if name == "COUNT"
    ));
}

#[test]
fn test_rejections() {
    assert!(matches!(
        parse_statement("SELEC name FROM companies", Dialect::Sqlite),
        Err(ParseError::Syntax(_))
    ));
    assert_eq!(
        parse_statement("SELECT 1; SELECT 2", Dialect::Sqlite),
        Err(ParseError::StatementCount(2))
    );
    for sql in [
        "SELECT name FROM companies UNION SELECT name FROM people",
        "SELECT industry FROM companies GROUP BY industry HAVING COUNT(*) > 1",
        "SELECT name FROM companies LIMIT 5 OFFSET 10",
        "SELECT * FROM (SELECT name FROM companies)",
        "SELECT a.name FROM companies a, people b",
        "SELECT name FROM companies WHERE id IN (SELECT company_id FROM people)",
    ] {
        assert!(
            matches!(
                parse_statement(sql, Dialect::Sqlite),
                Err(ParseError::Unsupported(_))
            ),
            "{sql}"
        );
    }
}

#[test]
fn test_reparsed_sql_round_trips_through_renderer() {
    let text = "SELECT industry, SUM(revenue) AS total FROM companies WHERE is_public = TRUE GROUP BY industry ORDER BY total DESC LIMIT 3";
    let statement = parse_statement(text, Dialect::Postgres).unwrap();
    let rendered = statement.to_sql(Dialect::Postgres);
    let again = parse_statement(&rendered, Dialect::Postgres).unwrap();
    assert_eq!(again, statement);
}
