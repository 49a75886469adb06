//! Cost estimation for typed statements.

use serde::Serialize;

use crate::catalog::{Entity, SemanticCatalog};
use crate::sql::expr::{BinaryOperator, Expr, UnaryOperator};
use crate::sql::query::{Query, TableBinding};
use crate::sql::statement::SqlStatement;

/// Row count assumed for tables without statistics.
pub const DEFAULT_ROW_COUNT: u64 = 1_000_000;
/// Row width assumed for tables without statistics.
pub const DEFAULT_AVG_ROW_BYTES: u64 = 100;

/// Selectivity of an equality against a column with unknown cardinality.
const EQ_SELECTIVITY: f64 = 0.1;
const RANGE_SELECTIVITY: f64 = 0.33;
const BETWEEN_SELECTIVITY: f64 = 0.25;
const LIKE_SELECTIVITY: f64 = 0.25;
const NULL_SELECTIVITY: f64 = 0.05;
const DEFAULT_SELECTIVITY: f64 = 0.5;
/// Fraction of rows surviving GROUP BY when column cardinality is unknown.
const GROUP_FRACTION: f64 = 0.3;

/// Pre-execution estimate. A heuristic, not a guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CostEstimate {
    /// Estimated number of output rows
    pub approximate_rows: u64,
    /// Estimated bytes read from base tables
    pub approximate_scan_bytes: u64,
    /// False when any table fell back to default statistics
    pub stats_complete: bool,
}

/// Intermediate result while walking a query.
struct Flow {
    rows: f64,
    scan_bytes: f64,
    complete: bool,
}

pub struct CostEstimator<'a> {
    catalog: &'a SemanticCatalog,
}

impl<'a> CostEstimator<'a> {
    pub fn new(catalog: &'a SemanticCatalog) -> Self {
        Self { catalog }
    }

    /// Estimate rows and scan size for a statement.
    ///
    /// Opaque statements are never executed, so they estimate to zero.
    pub fn estimate(&self, statement: &SqlStatement) -> CostEstimate {
        let Some(query) = statement.as_query() else {
            return CostEstimate {
                approximate_rows: 0,
                approximate_scan_bytes: 0,
                stats_complete: false,
            };
        };

        let flow = self.estimate_query(query);
        CostEstimate {
            approximate_rows: flow.rows.max(0.0).round() as u64,
            approximate_scan_bytes: flow.scan_bytes.max(0.0).round() as u64,
            stats_complete: flow.complete,
        }
    }

    fn estimate_query(&self, query: &Query) -> Flow {
        let scope = query.scope();
        let mut rows: f64 = 0.0;
        let mut scan_bytes = 0.0;
        let mut complete = true;

        for binding in &scope {
            let source = self.estimate_source(query, binding);
            // Joins along declared keys: the larger side bounds the result.
            rows = rows.max(source.rows);
            scan_bytes += source.scan_bytes;
            complete &= source.complete;
        }
        if scope.is_empty() {
            rows = 1.0;
        }

        if let Some(predicate) = &query.where_clause {
            rows *= self.selectivity(predicate, &scope);
        }

        if !query.group_by.is_empty() {
            let distinct: Option<f64> = query
                .group_by
                .iter()
                .map(|g| self.distinct_count(g, &scope))
                .product::<Option<f64>>();
            rows = match distinct {
                Some(groups) => groups.min(rows),
                None => rows * GROUP_FRACTION,
            }
            .max(1.0_f64.min(rows));
        } else if query.has_aggregates() {
            rows = 1.0;
        }

        if let Some(limit) = query.limit {
            rows = rows.min(limit as f64);
        }

        Flow {
            rows,
            scan_bytes,
            complete,
        }
    }

    fn estimate_source(&self, query: &Query, binding: &TableBinding) -> Flow {
        match &binding.table {
            Some(table) => match self.catalog.entity_by_table(table) {
                Some(entity) => {
                    let rows = entity.stats.row_count;
                    let width = entity.stats.avg_row_bytes;
                    let rows_f = rows.unwrap_or(DEFAULT_ROW_COUNT) as f64;
                    Flow {
                        rows: rows_f,
                        scan_bytes: rows_f * width.unwrap_or(DEFAULT_AVG_ROW_BYTES) as f64,
                        complete: rows.is_some() && width.is_some(),
                    }
                }
                None => Flow {
                    rows: DEFAULT_ROW_COUNT as f64,
                    scan_bytes: (DEFAULT_ROW_COUNT * DEFAULT_AVG_ROW_BYTES) as f64,
                    complete: false,
                },
            },
            None => match query
                .with
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(&binding.name))
            {
                Some(cte) => self.estimate_query(&cte.query),
                None => Flow {
                    rows: DEFAULT_ROW_COUNT as f64,
                    scan_bytes: 0.0,
                    complete: false,
                },
            },
        }
    }

    /// Fraction of rows passing `predicate`, between 0.0 and 1.0.
    fn selectivity(&self, predicate: &Expr, scope: &[TableBinding]) -> f64 {
        let sel = match predicate {
            Expr::BinaryOp { left, op, right } => match op {
                BinaryOperator::And => {
                    self.selectivity(left, scope) * self.selectivity(right, scope)
                }
                BinaryOperator::Or => {
                    let l = self.selectivity(left, scope);
                    let r = self.selectivity(right, scope);
                    l + r - (l * r)
                }
                BinaryOperator::Eq => self.equality(left, right, scope),
                BinaryOperator::Ne => 1.0 - self.equality(left, right, scope),
                BinaryOperator::Lt
                | BinaryOperator::Lte
                | BinaryOperator::Gt
                | BinaryOperator::Gte => RANGE_SELECTIVITY,
                BinaryOperator::Like => LIKE_SELECTIVITY,
                BinaryOperator::NotLike => 1.0 - LIKE_SELECTIVITY,
                _ => DEFAULT_SELECTIVITY,
            },
            Expr::In {
                expr,
                values,
                negated,
            } => {
                let one = self
                    .distinct_count(expr, scope)
                    .map_or(EQ_SELECTIVITY, |d| 1.0 / d.max(1.0));
                let sel = (one * values.len() as f64).min(1.0);
                if *negated {
                    1.0 - sel
                } else {
                    sel
                }
            }
            Expr::Between { negated, .. } => {
                if *negated {
                    1.0 - BETWEEN_SELECTIVITY
                } else {
                    BETWEEN_SELECTIVITY
                }
            }
            Expr::IsNull { negated, .. } => {
                if *negated {
                    1.0 - NULL_SELECTIVITY
                } else {
                    NULL_SELECTIVITY
                }
            }
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr,
            } => 1.0 - self.selectivity(expr, scope),
            Expr::Paren(inner) => self.selectivity(inner, scope),
            Expr::Literal(crate::sql::expr::Literal::Bool(b)) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            _ => DEFAULT_SELECTIVITY,
        };
        sel.clamp(0.0, 1.0)
    }

    /// Selectivity of `left = right`: one over the column's distinct count
    /// when known.
    fn equality(&self, left: &Expr, right: &Expr, scope: &[TableBinding]) -> f64 {
        self.distinct_count(left, scope)
            .or_else(|| self.distinct_count(right, scope))
            .map_or(EQ_SELECTIVITY, |d| 1.0 / d.max(1.0))
    }

    /// Distinct count for a column expression, via its table's statistics.
    fn distinct_count(&self, expr: &Expr, scope: &[TableBinding]) -> Option<f64> {
        let Expr::Column { table, column } = expr else {
            return None;
        };
        let entity = self.column_entity(table.as_deref(), scope)?;
        entity.distinct_count(column).map(|d| d as f64)
    }

    fn column_entity(&self, qualifier: Option<&str>, scope: &[TableBinding]) -> Option<&'a Entity> {
        let table = match qualifier {
            Some(q) => scope
                .iter()
                .find(|b| b.name.eq_ignore_ascii_case(q))
                .and_then(|b| b.table.as_deref())?,
            None => match scope {
                [only] => only.table.as_deref()?,
                _ => return None,
            },
        };
        self.catalog.entity_by_table(table)
    }
}
