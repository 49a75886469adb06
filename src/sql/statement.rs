//! Typed SQL statements.
//!
//! [`SqlStatement`] is what the builder produces and what the validator,
//! estimator and executor consume. Read-only queries carry the full
//! [`Query`] tree. Every other statement is kept opaque but tagged with its
//! [`StatementKind`], so the kind check is a property of the value rather
//! than of the text.

use std::collections::BTreeSet;
use std::fmt;

use super::dialect::Dialect;
use super::expr::Expr;
use super::query::{Query, TableBinding, TableRef};

/// Statement kinds, as far as the validator needs to tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    Create,
    Alter,
    Drop,
    Truncate,
    Other,
}

impl StatementKind {
    pub const ALL: [StatementKind; 10] = [
        StatementKind::Select,
        StatementKind::Insert,
        StatementKind::Update,
        StatementKind::Delete,
        StatementKind::Merge,
        StatementKind::Create,
        StatementKind::Alter,
        StatementKind::Drop,
        StatementKind::Truncate,
        StatementKind::Other,
    ];

    pub fn is_read_only(&self) -> bool {
        matches!(self, StatementKind::Select)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
            StatementKind::Merge => "MERGE",
            StatementKind::Create => "CREATE",
            StatementKind::Alter => "ALTER",
            StatementKind::Drop => "DROP",
            StatementKind::Truncate => "TRUNCATE",
            StatementKind::Other => "OTHER",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column reference resolved to the physical table it reads from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnRef {
    pub table: String,
    /// Column name, or `*` for a wildcard projection.
    pub column: String,
}

impl ColumnRef {
    pub fn is_wildcard(&self) -> bool {
        self.column == "*"
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// A typed SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlStatement {
    /// A read-only query in the restricted analytic grammar.
    Select(Query),
    /// Any non-SELECT statement. Never rendered from parts: the original
    /// text is carried so the kind can be reported, but it is never executed.
    Opaque {
        kind: StatementKind,
        tables: Vec<TableRef>,
        text: String,
    },
}

impl SqlStatement {
    pub fn kind(&self) -> StatementKind {
        match self {
            SqlStatement::Select(_) => StatementKind::Select,
            SqlStatement::Opaque { kind, .. } => *kind,
        }
    }

    pub fn as_query(&self) -> Option<&Query> {
        match self {
            SqlStatement::Select(q) => Some(q),
            SqlStatement::Opaque { .. } => None,
        }
    }

    pub fn limit(&self) -> Option<u64> {
        self.as_query().and_then(|q| q.limit)
    }

    /// Copy of this statement with the outer row limit replaced.
    pub fn with_limit(&self, limit: u64) -> SqlStatement {
        match self {
            SqlStatement::Select(q) => SqlStatement::Select(q.clone().limit(limit)),
            other => other.clone(),
        }
    }

    /// Physical tables read or written, deduplicated, in name order.
    /// Schema-qualified references keep their schema (`schema.table`).
    ///
    /// CTE names are not tables; the tables their bodies read are.
    pub fn referenced_tables(&self) -> Vec<String> {
        let mut tables = BTreeSet::new();
        match self {
            SqlStatement::Select(q) => collect_tables(q, &mut tables),
            SqlStatement::Opaque { tables: t, .. } => {
                tables.extend(t.iter().map(TableRef::qualified_name));
            }
        }
        tables.into_iter().collect()
    }

    /// Columns read, each attributed to a physical table.
    ///
    /// An unqualified column in a scope with several tables is attributed to
    /// every one of them. Columns read through a CTE are accounted for by the
    /// CTE's own body.
    pub fn referenced_columns(&self) -> Vec<ColumnRef> {
        let mut columns = BTreeSet::new();
        if let SqlStatement::Select(q) = self {
            collect_columns(q, &mut columns);
        }
        columns.into_iter().collect()
    }

    /// Names of the functions called anywhere in the statement, upper-cased
    /// and deduplicated.
    pub fn referenced_functions(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        if let SqlStatement::Select(q) = self {
            collect_functions(q, &mut names);
        }
        names.into_iter().collect()
    }

    /// Render to SQL text.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        match self {
            SqlStatement::Select(q) => q.to_sql(dialect),
            SqlStatement::Opaque { text, .. } => text.clone(),
        }
    }
}

impl From<Query> for SqlStatement {
    fn from(query: Query) -> Self {
        SqlStatement::Select(query)
    }
}

fn collect_tables(query: &Query, out: &mut BTreeSet<String>) {
    for cte in &query.with {
        collect_tables(&cte.query, out);
    }
    out.extend(query.scope().into_iter().filter_map(|b| b.table));
}

fn collect_functions(query: &Query, out: &mut BTreeSet<String>) {
    for cte in &query.with {
        collect_functions(&cte.query, out);
    }
    query.for_each_expr(&mut |e| e.for_each_function(&mut |name| {
        out.insert(name.to_ascii_uppercase());
    }));
}

fn collect_columns(query: &Query, out: &mut BTreeSet<ColumnRef>) {
    for cte in &query.with {
        collect_columns(&cte.query, out);
    }

    let scope = query.scope();
    let physical: Vec<&str> = scope.iter().filter_map(|b| b.table.as_deref()).collect();

    let mut attribute = |qualifier: Option<&str>, column: &str| match qualifier {
        Some(q) => {
            if let Some(table) = resolve(&scope, q) {
                out.insert(ColumnRef {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }
        None => {
            for table in &physical {
                out.insert(ColumnRef {
                    table: (*table).to_string(),
                    column: column.to_string(),
                });
            }
        }
    };

    for item in &query.select {
        if let Expr::Star { table } = &item.expr {
            attribute(table.as_deref(), "*");
        }
    }

    let aliases: Vec<&str> = query
        .select
        .iter()
        .filter_map(|s| s.alias.as_deref())
        .collect();

    query.select.iter().for_each(|s| s.expr.for_each_column(&mut attribute));
    query.joins.iter().for_each(|j| j.on.for_each_column(&mut attribute));
    if let Some(w) = &query.where_clause {
        w.for_each_column(&mut attribute);
    }
    query.group_by.iter().for_each(|g| g.for_each_column(&mut attribute));

    // ORDER BY may name an output alias instead of a source column.
    for item in &query.order_by {
        item.expr.for_each_column(&mut |q, c| {
            let is_alias = q.is_none() && aliases.iter().any(|a| a.eq_ignore_ascii_case(c));
            if !is_alias {
                attribute(q, c);
            }
        });
    }
}

/// Resolve a column qualifier to a physical table. Qualifiers bound to a CTE
/// resolve to nothing; unknown qualifiers are taken as table names.
fn resolve<'a>(scope: &'a [TableBinding], qualifier: &'a str) -> Option<&'a str> {
    match scope
        .iter()
        .find(|b| b.name.eq_ignore_ascii_case(qualifier))
    {
        Some(binding) => binding.table.as_deref(),
        None => Some(qualifier),
    }
}
