//! Statement builder: QueryPlan + JoinPath -> typed SqlStatement.
//!
//! A pure transform. Every plan field is resolved to its column through the
//! owning entity, measures are wrapped in their declared aggregation and the
//! join path is applied in order. GROUP BY is derived as exactly the
//! non-aggregated selected fields, and the plan must say so: a dimension
//! selected next to a measure without being listed in the grouping is an
//! error rather than an implicit group.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::error::PlanError;
use super::join_path::JoinPath;
use super::plan::{FieldRef, Filter, FilterOp, FilterValue, QueryPlan};
use crate::catalog::{Dimension, Entity, Field, SemanticCatalog, ValueType};
use crate::sql::expr::{self, conjunction, BinaryOperator, Expr, ExprExt};
use crate::sql::query::{OrderByExpr, Query, SelectExpr, TableRef};
use crate::sql::statement::SqlStatement;

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").unwrap());

/// A selected field after resolution.
struct Resolved<'c> {
    field: FieldRef,
    entity: &'c Entity,
    target: Field<'c>,
    expr: Expr,
    alias: String,
}

/// Compiles plans against a catalog.
pub struct StatementBuilder<'a> {
    catalog: &'a SemanticCatalog,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(catalog: &'a SemanticCatalog) -> Self {
        Self { catalog }
    }

    pub fn build(&self, plan: &QueryPlan, path: &JoinPath) -> Result<SqlStatement, PlanError> {
        for id in plan.entities() {
            if !path.contains(id) {
                return Err(PlanError::EntityNotInPath(id.clone()));
            }
        }

        let mut query = Query::new().from(self.table_ref(&path.root)?);
        for step in &path.steps {
            let on = conjunction(
                step.from_columns
                    .iter()
                    .zip(&step.to_columns)
                    .map(|(l, r)| expr::table_col(&step.from, l).eq(expr::table_col(&step.to, r))),
            );
            // Catalog ingestion rejects joins without keys.
            let on = on.ok_or_else(|| PlanError::EntityNotInPath(step.to.clone()))?;
            query = query.inner_join(self.table_ref(&step.to)?, on);
        }

        let selected = self.resolve_selection(plan)?;
        query.select = selected
            .iter()
            .map(|r| SelectExpr::new(r.expr.clone()).with_alias(&r.alias))
            .collect();

        query.group_by = self.derive_grouping(plan, &selected)?;

        let predicates = plan
            .filters()
            .iter()
            .map(|f| self.compile_filter(f))
            .collect::<Result<Vec<_>, _>>()?;
        query.where_clause = conjunction(predicates);

        for item in plan.order_by() {
            let resolved = selected
                .iter()
                .find(|r| r.field == item.field)
                .ok_or_else(|| PlanError::OrderNotSelected(item.field.to_string()))?;
            query.order_by.push(if item.descending {
                OrderByExpr::desc(resolved.expr.clone())
            } else {
                OrderByExpr::asc(resolved.expr.clone())
            });
        }

        query.limit = plan.limit();

        Ok(SqlStatement::Select(query))
    }

    fn entity(&self, id: &str) -> Result<&'a Entity, PlanError> {
        self.catalog
            .lookup_entity(id)
            .map_err(|_| PlanError::UnknownEntity(id.to_string()))
    }

    /// FROM/JOIN reference for an entity, aliased by its id.
    fn table_ref(&self, id: &str) -> Result<TableRef, PlanError> {
        let entity = self.entity(id)?;
        let mut table = TableRef::new(&entity.table).with_alias(&entity.id);
        table.schema = entity.schema.clone();
        Ok(table)
    }

    fn field(&self, field: &FieldRef) -> Result<(&'a Entity, Field<'a>), PlanError> {
        let entity = self.entity(&field.entity)?;
        let target = entity
            .field(&field.field)
            .ok_or_else(|| PlanError::UnknownField {
                entity: field.entity.clone(),
                field: field.field.clone(),
            })?;
        Ok((entity, target))
    }

    fn resolve_selection(&self, plan: &QueryPlan) -> Result<Vec<Resolved<'a>>, PlanError> {
        let mut name_counts: HashMap<&str, usize> = HashMap::new();
        for f in plan.select() {
            *name_counts.entry(f.field.as_str()).or_default() += 1;
        }

        plan.select()
            .iter()
            .map(|f| {
                let (entity, target) = self.field(f)?;
                let column = expr::table_col(&entity.id, target.column());
                let expr = match target {
                    Field::Dimension(_) => column,
                    Field::Measure(m) => m.aggregation.apply(column),
                };
                let alias = if name_counts[f.field.as_str()] > 1 {
                    format!("{}_{}", f.entity.to_lowercase(), f.field)
                } else {
                    f.field.clone()
                };
                Ok(Resolved {
                    field: f.clone(),
                    entity,
                    target,
                    expr,
                    alias,
                })
            })
            .collect()
    }

    fn derive_grouping(
        &self,
        plan: &QueryPlan,
        selected: &[Resolved<'a>],
    ) -> Result<Vec<Expr>, PlanError> {
        for g in plan.group_by() {
            let (_, target) = self.field(g)?;
            if target.is_measure() {
                return Err(PlanError::MeasureInGroupBy(g.to_string()));
            }
            if !selected.iter().any(|r| &r.field == g) {
                return Err(PlanError::GroupingNotSelected(g.to_string()));
            }
        }

        let has_measures = selected.iter().any(|r| r.target.is_measure());
        if !has_measures && plan.group_by().is_empty() {
            return Ok(vec![]);
        }

        let mut group_by = Vec::new();
        for r in selected.iter().filter(|r| !r.target.is_measure()) {
            if !plan.group_by().contains(&r.field) {
                return Err(PlanError::AmbiguousAggregation(r.field.to_string()));
            }
            group_by.push(expr::table_col(&r.entity.id, r.target.column()));
        }
        Ok(group_by)
    }

    fn compile_filter(&self, filter: &Filter) -> Result<Expr, PlanError> {
        let (entity, target) = self.field(&filter.field)?;
        let dim = match target {
            Field::Dimension(d) => d,
            Field::Measure(_) => return Err(PlanError::FilterOnMeasure(filter.field.to_string())),
        };
        let name = filter.field.to_string();
        let column = expr::table_col(&entity.id, &dim.column);

        let applicable = match filter.op {
            FilterOp::Like => dim.value_type == ValueType::String,
            op if op.is_range() => dim.value_type != ValueType::Boolean,
            _ => true,
        };
        if !applicable {
            return Err(PlanError::OperatorNotApplicable {
                field: name,
                op: filter.op.to_string(),
                value_type: dim.value_type,
            });
        }

        let value = match (&filter.op, &filter.value) {
            (FilterOp::IsNull, _) => return Ok(column.is_null()),
            (FilterOp::IsNotNull, _) => return Ok(column.is_not_null()),
            (_, Some(value)) => value,
            (op, None) => {
                return Err(PlanError::TypeMismatch {
                    field: name,
                    expected: dim.value_type,
                    found: format!("no value for {op}"),
                })
            }
        };

        let check_domain = matches!(filter.op, FilterOp::Eq | FilterOp::Ne | FilterOp::In);

        Ok(match filter.op {
            FilterOp::In => {
                let items = match value {
                    FilterValue::List(items) => items,
                    other => std::slice::from_ref(other),
                };
                let values = items
                    .iter()
                    .map(|v| literal(&name, dim, v, check_domain))
                    .collect::<Result<Vec<_>, _>>()?;
                column.in_list(values)
            }
            FilterOp::Like => column.like(literal(&name, dim, value, false)?),
            op => {
                let rhs = literal(&name, dim, value, check_domain)?;
                let bin = match op {
                    FilterOp::Eq => BinaryOperator::Eq,
                    FilterOp::Ne => BinaryOperator::Ne,
                    FilterOp::Lt => BinaryOperator::Lt,
                    FilterOp::Lte => BinaryOperator::Lte,
                    FilterOp::Gt => BinaryOperator::Gt,
                    _ => BinaryOperator::Gte,
                };
                Expr::BinaryOp {
                    left: Box::new(column),
                    op: bin,
                    right: Box::new(rhs),
                }
            }
        })
    }
}

/// Type-check one filter value against a dimension and turn it into a literal.
fn literal(
    field: &str,
    dim: &Dimension,
    value: &FilterValue,
    check_domain: bool,
) -> Result<Expr, PlanError> {
    let mismatch = || PlanError::TypeMismatch {
        field: field.to_string(),
        expected: dim.value_type,
        found: value.type_name().to_string(),
    };

    let lit = match (dim.value_type, value) {
        (ValueType::String, FilterValue::Text(s)) => expr::lit_str(s),
        (ValueType::Number, FilterValue::Integer(n)) => expr::lit_int(*n),
        (ValueType::Number, FilterValue::Float(f)) => expr::lit_float(*f),
        (ValueType::Boolean, FilterValue::Bool(b)) => expr::lit_bool(*b),
        (ValueType::Date, FilterValue::Text(s)) if ISO_DATE.is_match(s) => expr::lit_date(s),
        (ValueType::Date, FilterValue::Text(s)) => {
            return Err(PlanError::TypeMismatch {
                field: field.to_string(),
                expected: ValueType::Date,
                found: format!("{s:?} (expected YYYY-MM-DD)"),
            })
        }
        _ => return Err(mismatch()),
    };

    if check_domain {
        if let (Some(domain), FilterValue::Text(s)) = (&dim.domain, value) {
            if !domain.iter().any(|d| d == s) {
                return Err(PlanError::ValueOutsideDomain {
                    field: field.to_string(),
                    value: s.clone(),
                });
            }
        }
    }

    Ok(lit)
}
