//! Lowering of proposed SQL text into the typed IR.
//!
//! Text is parsed with `sqlparser` using the target dialect, then lowered
//! into [`SqlStatement`]. SELECT statements must fit the restricted analytic
//! grammar (WITH, JOIN, WHERE, GROUP BY, ORDER BY, LIMIT, aggregates); every
//! other statement becomes an [`SqlStatement::Opaque`] tagged with its kind so
//! the validator can reject it without looking at the text.

use sqlparser::ast::{self as ast, SetExpr, Statement};
use sqlparser::parser::Parser;
use thiserror::Error;

use super::dialect::Dialect;
use super::expr::{self, BinaryOperator, Expr, ExprExt, UnaryOperator};
use super::query::{Cte, JoinType, NullsOrder, OrderByExpr, Query, SelectExpr, SortDir, TableRef};
use super::statement::{SqlStatement, StatementKind};

/// Errors from lowering SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("SQL syntax error: {0}")]
    Syntax(String),

    #[error("expected exactly one statement, found {0}")]
    StatementCount(usize),

    #[error("unsupported SQL construct: {0}")]
    Unsupported(String),
}

type Result<T> = std::result::Result<T, ParseError>;

fn unsupported<T>(what: impl Into<String>) -> Result<T> {
    Err(ParseError::Unsupported(what.into()))
}

/// Parse exactly one statement and lower it into the typed IR.
pub fn parse_statement(text: &str, dialect: Dialect) -> Result<SqlStatement> {
    let parser_dialect = dialect.parser_dialect();
    let statements = Parser::parse_sql(parser_dialect.as_ref(), text)
        .map_err(|e| ParseError::Syntax(e.to_string()))?;

    let [statement]: [Statement; 1] = statements
        .try_into()
        .map_err(|v: Vec<Statement>| ParseError::StatementCount(v.len()))?;

    lower_statement(statement, text)
}

fn lower_statement(statement: Statement, text: &str) -> Result<SqlStatement> {
    let opaque = |kind: StatementKind, names: Vec<&ast::ObjectName>| -> Result<SqlStatement> {
        let tables = names.into_iter().filter_map(|n| table_ref(n).ok()).collect();
        Ok(SqlStatement::Opaque {
            kind,
            tables,
            text: text.trim().to_string(),
        })
    };

    match &statement {
        Statement::Query(query) => lower_query(query).map(SqlStatement::Select),
        Statement::Insert(insert) => opaque(StatementKind::Insert, vec![&insert.table_name]),
        Statement::Update { table, .. } => {
            opaque(StatementKind::Update, relation_names(std::slice::from_ref(table)))
        }
        Statement::Delete(delete) => {
            let mut names: Vec<&ast::ObjectName> = delete.tables.iter().collect();
            let from = match &delete.from {
                ast::FromTable::WithFromKeyword(t) | ast::FromTable::WithoutKeyword(t) => t,
            };
            names.extend(relation_names(from));
            opaque(StatementKind::Delete, names)
        }
        Statement::Merge { table, .. } => {
            let names = match table {
                ast::TableFactor::Table { name, .. } => vec![name],
                _ => vec![],
            };
            opaque(StatementKind::Merge, names)
        }
        Statement::CreateTable(create) => opaque(StatementKind::Create, vec![&create.name]),
        Statement::CreateView { name, .. } => opaque(StatementKind::Create, vec![name]),
        Statement::CreateIndex(index) => opaque(StatementKind::Create, vec![&index.table_name]),
        Statement::AlterTable { name, .. } => opaque(StatementKind::Alter, vec![name]),
        Statement::Drop { names, .. } => opaque(StatementKind::Drop, names.iter().collect()),
        Statement::Truncate { table_names, .. } => opaque(
            StatementKind::Truncate,
            table_names.iter().map(|t| &t.name).collect(),
        ),
        _ => opaque(StatementKind::Other, vec![]),
    }
}

fn relation_names(tables: &[ast::TableWithJoins]) -> Vec<&ast::ObjectName> {
    tables
        .iter()
        .flat_map(|t| std::iter::once(&t.relation).chain(t.joins.iter().map(|j| &j.relation)))
        .filter_map(|r| match r {
            ast::TableFactor::Table { name, .. } => Some(name),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Queries
// =============================================================================

fn lower_query(query: &ast::Query) -> Result<Query> {
    if query.offset.is_some() || query.fetch.is_some() {
        return unsupported("OFFSET/FETCH");
    }
    if !query.locks.is_empty() || query.for_clause.is_some() {
        return unsupported("locking clause");
    }
    if !query.limit_by.is_empty() || query.settings.is_some() || query.format_clause.is_some() {
        return unsupported("dialect-specific query clause");
    }

    let select = match query.body.as_ref() {
        SetExpr::Select(select) => select,
        SetExpr::Query(_) => return unsupported("parenthesized query"),
        _ => return unsupported("set operation"),
    };

    let mut out = lower_select(select)?;

    if let Some(with) = &query.with {
        if with.recursive {
            return unsupported("WITH RECURSIVE");
        }
        for cte in &with.cte_tables {
            if !cte.alias.columns.is_empty() {
                return unsupported("CTE column list");
            }
            out.with.push(Cte::new(&cte.alias.name.value, lower_query(&cte.query)?));
        }
    }

    if let Some(order_by) = &query.order_by {
        if order_by.interpolate.is_some() {
            return unsupported("INTERPOLATE");
        }
        out.order_by = order_by
            .exprs
            .iter()
            .map(lower_order_by)
            .collect::<Result<_>>()?;
    }

    if let Some(limit) = &query.limit {
        out.limit = Some(match limit {
            ast::Expr::Value(ast::Value::Number(n, _)) => n
                .parse::<u64>()
                .map_err(|_| ParseError::Unsupported(format!("LIMIT {n}")))?,
            other => return unsupported(format!("LIMIT {other}")),
        });
    }

    Ok(out)
}

fn lower_select(select: &ast::Select) -> Result<Query> {
    if select.top.is_some() {
        return unsupported("TOP");
    }
    if select.into.is_some() {
        return unsupported("SELECT INTO");
    }
    if select.having.is_some() {
        return unsupported("HAVING");
    }
    if select.qualify.is_some() || select.prewhere.is_some() || select.connect_by.is_some() {
        return unsupported("dialect-specific SELECT clause");
    }
    if !select.lateral_views.is_empty() || !select.named_window.is_empty() {
        return unsupported("LATERAL VIEW/WINDOW");
    }

    let mut query = Query::new();

    query.distinct = match &select.distinct {
        None => false,
        Some(ast::Distinct::Distinct) => true,
        Some(ast::Distinct::On(_)) => return unsupported("DISTINCT ON"),
    };

    query.select = select
        .projection
        .iter()
        .map(lower_select_item)
        .collect::<Result<_>>()?;

    match select.from.as_slice() {
        [] => {}
        [source] => {
            query.from = Some(lower_table_factor(&source.relation)?);
            for join in &source.joins {
                let (join_type, constraint) = match &join.join_operator {
                    ast::JoinOperator::Inner(c) => (JoinType::Inner, c),
                    ast::JoinOperator::LeftOuter(c) => (JoinType::Left, c),
                    other => return unsupported(format!("join operator {other:?}")),
                };
                let on = match constraint {
                    ast::JoinConstraint::On(e) => lower_expr(e)?,
                    _ => return unsupported("join without ON condition"),
                };
                query.joins.push(super::query::Join {
                    join_type,
                    table: lower_table_factor(&join.relation)?,
                    on,
                });
            }
        }
        _ => return unsupported("comma-separated FROM list"),
    }

    if let Some(selection) = &select.selection {
        query.where_clause = Some(lower_expr(selection)?);
    }

    query.group_by = match &select.group_by {
        ast::GroupByExpr::Expressions(exprs, modifiers) if modifiers.is_empty() => {
            exprs.iter().map(lower_expr).collect::<Result<_>>()?
        }
        ast::GroupByExpr::Expressions(..) => return unsupported("GROUP BY modifier"),
        ast::GroupByExpr::All(_) => return unsupported("GROUP BY ALL"),
    };

    Ok(query)
}

fn lower_select_item(item: &ast::SelectItem) -> Result<SelectExpr> {
    match item {
        ast::SelectItem::UnnamedExpr(e) => Ok(SelectExpr::new(lower_expr(e)?)),
        ast::SelectItem::ExprWithAlias { expr, alias } => {
            Ok(SelectExpr::new(lower_expr(expr)?).with_alias(&alias.value))
        }
        ast::SelectItem::Wildcard(_) => Ok(SelectExpr::new(expr::star())),
        ast::SelectItem::QualifiedWildcard(name, _) => match name.0.as_slice() {
            [table] => Ok(SelectExpr::new(Expr::Star {
                table: Some(table.value.clone()),
            })),
            _ => unsupported(format!("wildcard {name}.*")),
        },
    }
}

fn lower_table_factor(factor: &ast::TableFactor) -> Result<TableRef> {
    match factor {
        ast::TableFactor::Table {
            name, alias, args, ..
        } => {
            if args.is_some() {
                return unsupported(format!("table function {name}"));
            }
            let mut table = table_ref(name)?;
            if let Some(alias) = alias {
                if !alias.columns.is_empty() {
                    return unsupported("table alias column list");
                }
                table = table.with_alias(&alias.name.value);
            }
            Ok(table)
        }
        ast::TableFactor::Derived { .. } => unsupported("subquery in FROM"),
        other => unsupported(format!("table factor {other}")),
    }
}

fn table_ref(name: &ast::ObjectName) -> Result<TableRef> {
    match name.0.as_slice() {
        [table] => Ok(TableRef::new(&table.value)),
        [schema, table] => Ok(TableRef::new(&table.value).with_schema(&schema.value)),
        _ => unsupported(format!("table name {name}")),
    }
}

fn lower_order_by(item: &ast::OrderByExpr) -> Result<OrderByExpr> {
    if item.with_fill.is_some() {
        return unsupported("WITH FILL");
    }
    Ok(OrderByExpr {
        expr: lower_expr(&item.expr)?,
        dir: item
            .asc
            .map(|asc| if asc { SortDir::Asc } else { SortDir::Desc }),
        nulls: item.nulls_first.map(|first| {
            if first {
                NullsOrder::First
            } else {
                NullsOrder::Last
            }
        }),
    })
}

// =============================================================================
// Expressions
// =============================================================================

fn lower_expr(e: &ast::Expr) -> Result<Expr> {
    match e {
        ast::Expr::Identifier(ident) => Ok(expr::col(&ident.value)),
        ast::Expr::CompoundIdentifier(parts) => match parts.as_slice() {
            [table, column] => Ok(expr::table_col(&table.value, &column.value)),
            _ => unsupported(format!("identifier {e}")),
        },
        ast::Expr::Value(value) => lower_value(value),
        ast::Expr::TypedString {
            data_type: ast::DataType::Date,
            value,
        } => Ok(expr::lit_date(value)),
        ast::Expr::Nested(inner) => Ok(Expr::Paren(Box::new(lower_expr(inner)?))),
        ast::Expr::IsNull(inner) => Ok(lower_expr(inner)?.is_null()),
        ast::Expr::IsNotNull(inner) => Ok(lower_expr(inner)?.is_not_null()),
        ast::Expr::InList {
            expr,
            list,
            negated,
        } => Ok(Expr::In {
            expr: Box::new(lower_expr(expr)?),
            values: list.iter().map(lower_expr).collect::<Result<_>>()?,
            negated: *negated,
        }),
        ast::Expr::Between {
            expr,
            negated,
            low,
            high,
        } => Ok(Expr::Between {
            expr: Box::new(lower_expr(expr)?),
            low: Box::new(lower_expr(low)?),
            high: Box::new(lower_expr(high)?),
            negated: *negated,
        }),
        ast::Expr::Like {
            negated,
            any: false,
            expr,
            pattern,
            escape_char: None,
        } => Ok(Expr::BinaryOp {
            left: Box::new(lower_expr(expr)?),
            op: if *negated {
                BinaryOperator::NotLike
            } else {
                BinaryOperator::Like
            },
            right: Box::new(lower_expr(pattern)?),
        }),
        ast::Expr::BinaryOp { left, op, right } => Ok(Expr::BinaryOp {
            left: Box::new(lower_expr(left)?),
            op: lower_binary_op(op)?,
            right: Box::new(lower_expr(right)?),
        }),
        ast::Expr::UnaryOp { op, expr } => {
            let inner = lower_expr(expr)?;
            match op {
                ast::UnaryOperator::Plus => Ok(inner),
                ast::UnaryOperator::Minus => Ok(Expr::UnaryOp {
                    op: UnaryOperator::Minus,
                    expr: Box::new(inner),
                }),
                ast::UnaryOperator::Not => Ok(Expr::UnaryOp {
                    op: UnaryOperator::Not,
                    expr: Box::new(inner),
                }),
                other => unsupported(format!("unary operator {other}")),
            }
        }
        ast::Expr::Function(function) => lower_function(function),
        other => unsupported(format!("expression {other}")),
    }
}

fn lower_value(value: &ast::Value) -> Result<Expr> {
    match value {
        ast::Value::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Ok(expr::lit_int(i))
            } else if let Ok(f) = n.parse::<f64>() {
                Ok(expr::lit_float(f))
            } else {
                unsupported(format!("number {n}"))
            }
        }
        ast::Value::SingleQuotedString(s) => Ok(expr::lit_str(s)),
        ast::Value::Boolean(b) => Ok(expr::lit_bool(*b)),
        ast::Value::Null => Ok(expr::lit_null()),
        other => unsupported(format!("literal {other}")),
    }
}

fn lower_binary_op(op: &ast::BinaryOperator) -> Result<BinaryOperator> {
    Ok(match op {
        ast::BinaryOperator::Eq => BinaryOperator::Eq,
        ast::BinaryOperator::NotEq => BinaryOperator::Ne,
        ast::BinaryOperator::Lt => BinaryOperator::Lt,
        ast::BinaryOperator::LtEq => BinaryOperator::Lte,
        ast::BinaryOperator::Gt => BinaryOperator::Gt,
        ast::BinaryOperator::GtEq => BinaryOperator::Gte,
        ast::BinaryOperator::And => BinaryOperator::And,
        ast::BinaryOperator::Or => BinaryOperator::Or,
        ast::BinaryOperator::Plus => BinaryOperator::Plus,
        ast::BinaryOperator::Minus => BinaryOperator::Minus,
        ast::BinaryOperator::Multiply => BinaryOperator::Mul,
        ast::BinaryOperator::Divide => BinaryOperator::Div,
        other => return unsupported(format!("operator {other}")),
    })
}

fn lower_function(function: &ast::Function) -> Result<Expr> {
    if function.filter.is_some() || function.over.is_some() || !function.within_group.is_empty() {
        return unsupported(format!("function modifiers on {}", function.name));
    }
    if !matches!(function.parameters, ast::FunctionArguments::None) {
        return unsupported(format!("parameterized function {}", function.name));
    }

    let name = match function.name.0.as_slice() {
        [name] => name.value.to_uppercase(),
        _ => return unsupported(format!("function {}", function.name)),
    };

    let (args, distinct) = match &function.args {
        ast::FunctionArguments::None => (vec![], false),
        ast::FunctionArguments::Subquery(_) => return unsupported("subquery argument"),
        ast::FunctionArguments::List(list) => {
            if !list.clauses.is_empty() {
                return unsupported(format!("argument clauses on {name}"));
            }
            let args = list
                .args
                .iter()
                .map(|arg| match arg {
                    ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Expr(e)) => lower_expr(e),
                    ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Wildcard) => Ok(expr::star()),
                    other => unsupported(format!("function argument {other}")),
                })
                .collect::<Result<Vec<_>>>()?;
            let distinct = matches!(
                list.duplicate_treatment,
                Some(ast::DuplicateTreatment::Distinct)
            );
            (args, distinct)
        }
    };

    Ok(Expr::Function {
        name,
        args,
        distinct,
    })
}
