//! Statement reformulation after a repairable failure.

use async_trait::async_trait;

use super::classify::{ClassifiedError, FailureClass, ObjectKind};
use crate::sql::expr::{conjunction, Expr};
use crate::sql::{Query, SqlStatement};

/// Produces a revised statement informed by a failure.
///
/// Returning `None` ends the repair session. Whatever is returned is
/// validated again before it runs.
#[async_trait]
pub trait Reformulator: Send + Sync {
    async fn reformulate(
        &self,
        statement: &SqlStatement,
        failure: &ClassifiedError,
    ) -> Option<SqlStatement>;
}

/// Never reformulates; every failure is final.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReformulation;

#[async_trait]
impl Reformulator for NoReformulation {
    async fn reformulate(&self, _: &SqlStatement, _: &ClassifiedError) -> Option<SqlStatement> {
        None
    }
}

/// Local repairs that need no external reasoner:
///
/// - missing column: drop every projection, grouping, ordering and filter
///   term that reads it
/// - type mismatch: drop the filter terms reading the named column, or the
///   whole filter when it has a single term
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicReformulator;

#[async_trait]
impl Reformulator for HeuristicReformulator {
    async fn reformulate(
        &self,
        statement: &SqlStatement,
        failure: &ClassifiedError,
    ) -> Option<SqlStatement> {
        let query = statement.as_query()?;
        let revised = match failure.class {
            FailureClass::MissingObject => {
                let object = failure.object.as_ref().filter(|o| o.kind == ObjectKind::Column)?;
                let (qualifier, column) = object.parts();
                drop_column(query, qualifier, column)?
            }
            FailureClass::TypeMismatch => drop_filter(query, failure)?,
            _ => return None,
        };

        tracing::debug!(class = %failure.class, "statement reformulated");
        Some(SqlStatement::Select(revised))
    }
}

fn reads(expr: &Expr, qualifier: Option<&str>, column: &str) -> bool {
    let mut found = false;
    expr.for_each_column(&mut |table, name| {
        let table_matches = match (qualifier, table) {
            (Some(q), Some(t)) => q.eq_ignore_ascii_case(t),
            _ => true,
        };
        if table_matches && name.eq_ignore_ascii_case(column) {
            found = true;
        }
    });
    found
}

fn drop_column(query: &Query, qualifier: Option<&str>, column: &str) -> Option<Query> {
    let mut revised = query.clone();
    revised.select.retain(|s| !reads(&s.expr, qualifier, column));
    if revised.select.is_empty() {
        return None;
    }
    revised.group_by.retain(|g| !reads(g, qualifier, column));
    revised.order_by.retain(|o| !reads(&o.expr, qualifier, column));
    revised.where_clause = query.where_clause.as_ref().and_then(|w| {
        conjunction(
            w.conjuncts()
                .into_iter()
                .filter(|t| !reads(t, qualifier, column))
                .cloned(),
        )
    });
    (revised != *query).then_some(revised)
}

fn drop_filter(query: &Query, failure: &ClassifiedError) -> Option<Query> {
    let predicate = query.where_clause.as_ref()?;
    let terms = predicate.conjuncts();

    let kept: Vec<Expr> = match &failure.object {
        Some(object) => {
            let (qualifier, column) = object.parts();
            terms
                .into_iter()
                .filter(|t| !reads(t, qualifier, column))
                .cloned()
                .collect()
        }
        None if terms.len() == 1 => vec![],
        None => return None,
    };

    let mut revised = query.clone();
    revised.where_clause = conjunction(kept);
    (revised != *query).then_some(revised)
}
