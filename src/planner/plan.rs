//! Query plans and the plan proposal boundary.
//!
//! A [`PlanProposal`] is what an external reasoner sends: loosely typed JSON.
//! [`QueryPlan::try_from_proposal`] turns it into a typed, immutable
//! [`QueryPlan`] or rejects it with a [`StructuralError`]. Nothing is coerced:
//! a missing operator, a malformed `Entity.field` reference or a zero limit
//! is an error, not a default.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::StructuralError;

// =============================================================================
// Field references
// =============================================================================

/// A field qualified by its owning entity: `Company.industry`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldRef {
    pub entity: String,
    pub field: String,
}

impl FieldRef {
    pub fn new(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            field: field.into(),
        }
    }
}

impl FromStr for FieldRef {
    type Err = StructuralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('.') {
            Some((entity, field))
                if !entity.is_empty() && !field.is_empty() && !field.contains('.') =>
            {
                Ok(FieldRef::new(entity, field))
            }
            _ => Err(StructuralError::InvalidFieldRef(s.to_string())),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.field)
    }
}

// =============================================================================
// Filters
// =============================================================================

/// Filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Like,
    IsNull,
    IsNotNull,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::In => "IN",
            FilterOp::Like => "LIKE",
            FilterOp::IsNull => "IS NULL",
            FilterOp::IsNotNull => "IS NOT NULL",
        }
    }

    /// Does this operator take no value?
    pub fn is_unary(&self) -> bool {
        matches!(self, FilterOp::IsNull | FilterOp::IsNotNull)
    }

    pub fn is_range(&self) -> bool {
        matches!(
            self,
            FilterOp::Lt | FilterOp::Lte | FilterOp::Gt | FilterOp::Gte
        )
    }
}

impl FromStr for FilterOp {
    type Err = StructuralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        Ok(match normalized.to_ascii_lowercase().as_str() {
            "=" | "==" | "eq" => FilterOp::Eq,
            "!=" | "<>" | "ne" => FilterOp::Ne,
            "<" | "lt" => FilterOp::Lt,
            "<=" | "lte" => FilterOp::Lte,
            ">" | "gt" => FilterOp::Gt,
            ">=" | "gte" => FilterOp::Gte,
            "in" => FilterOp::In,
            "like" => FilterOp::Like,
            "is null" => FilterOp::IsNull,
            "is not null" => FilterOp::IsNotNull,
            _ => return Err(StructuralError::UnknownOperator(s.to_string())),
        })
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed filter value. Dates travel as ISO `YYYY-MM-DD` text and are
/// checked against the dimension type by the builder.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Short type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FilterValue::Text(_) => "string",
            FilterValue::Integer(_) | FilterValue::Float(_) => "number",
            FilterValue::Bool(_) => "boolean",
            FilterValue::List(_) => "list",
        }
    }

    fn from_json(value: &serde_json::Value, nested: bool) -> Result<Option<Self>, String> {
        use serde_json::Value;
        Ok(Some(match value {
            Value::Null => return Ok(None),
            Value::String(s) => FilterValue::Text(s.clone()),
            Value::Bool(b) => FilterValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FilterValue::Integer(i),
                None => FilterValue::Float(
                    n.as_f64().ok_or_else(|| format!("unrepresentable number {n}"))?,
                ),
            },
            Value::Array(items) if !nested => FilterValue::List(
                items
                    .iter()
                    .map(|item| match FilterValue::from_json(item, true)? {
                        Some(v) => Ok(v),
                        None => Err("null inside a value list".to_string()),
                    })
                    .collect::<Result<_, _>>()?,
            ),
            Value::Array(_) => return Err("nested lists are not allowed".into()),
            Value::Object(_) => return Err("objects are not filter values".into()),
        }))
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::Text(s.to_string())
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        FilterValue::Integer(n)
    }
}

impl From<f64> for FilterValue {
    fn from(f: f64) -> Self {
        FilterValue::Float(f)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        FilterValue::Bool(b)
    }
}

/// A filter predicate: `field op value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: FieldRef,
    pub op: FilterOp,
    pub value: Option<FilterValue>,
}

impl Filter {
    /// Check that the value's shape fits the operator.
    fn check_shape(&self) -> Result<(), String> {
        match (&self.op, &self.value) {
            (op, Some(_)) if op.is_unary() => Err(format!("{op} takes no value")),
            (op, None) if !op.is_unary() => Err(format!("{op} requires a value")),
            (FilterOp::In, Some(FilterValue::List(_))) => Ok(()),
            (FilterOp::In, Some(_)) => Err("IN requires a list value".into()),
            (op, Some(FilterValue::List(_))) => Err(format!("{op} does not take a list")),
            _ => Ok(()),
        }
    }
}

/// One ORDER BY item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub field: FieldRef,
    pub descending: bool,
}

// =============================================================================
// Query plan
// =============================================================================

/// A typed, structurally valid request. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    entities: Vec<String>,
    select: Vec<FieldRef>,
    filters: Vec<Filter>,
    group_by: Vec<FieldRef>,
    order_by: Vec<OrderItem>,
    limit: Option<u64>,
}

impl QueryPlan {
    pub fn builder() -> QueryPlanBuilder {
        QueryPlanBuilder::default()
    }

    /// Validate a loosely typed proposal into a plan.
    pub fn try_from_proposal(proposal: &PlanProposal) -> Result<Self, StructuralError> {
        if proposal.entities.is_empty() {
            return Err(StructuralError::EmptyEntities);
        }
        let mut builder = QueryPlan::builder();
        builder.entities = proposal.entities.clone();

        for field in &proposal.select {
            builder.select.push(field.parse()?);
        }

        for (index, filter) in proposal.filters.iter().enumerate() {
            let invalid = |reason: String| StructuralError::InvalidFilter { index, reason };
            let field = filter
                .field
                .as_deref()
                .ok_or_else(|| invalid("missing field".into()))?
                .parse()?;
            let op = filter
                .op
                .as_deref()
                .ok_or_else(|| invalid("missing op".into()))?
                .parse()?;
            let value = FilterValue::from_json(&filter.value, false).map_err(invalid)?;
            builder.filters.push(Filter { field, op, value });
        }

        for field in &proposal.group_by {
            builder.group_by.push(field.parse()?);
        }

        for item in &proposal.order_by {
            let descending = match item.direction.as_deref().map(str::to_ascii_lowercase) {
                None => false,
                Some(d) if d == "asc" => false,
                Some(d) if d == "desc" => true,
                Some(d) => return Err(StructuralError::InvalidDirection(d)),
            };
            builder.order_by.push(OrderItem {
                field: item.field.parse()?,
                descending,
            });
        }

        if let Some(limit) = proposal.limit {
            if limit <= 0 {
                return Err(StructuralError::InvalidLimit(limit));
            }
            builder.limit = Some(limit as u64);
        }

        builder.build()
    }

    /// Referenced entity ids, deduplicated, in declaration order.
    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn select(&self) -> &[FieldRef] {
        &self.select
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn group_by(&self) -> &[FieldRef] {
        &self.group_by
    }

    pub fn order_by(&self) -> &[OrderItem] {
        &self.order_by
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Entity ids in the order fields mention them: selections, then
    /// filters, grouping and ordering. Used for join root tie-breaking.
    pub fn reference_sequence(&self) -> Vec<&str> {
        self.select
            .iter()
            .chain(self.filters.iter().map(|f| &f.field))
            .chain(self.group_by.iter())
            .chain(self.order_by.iter().map(|o| &o.field))
            .map(|f| f.entity.as_str())
            .collect()
    }
}

/// Incremental construction of a [`QueryPlan`].
#[derive(Debug, Clone, Default)]
#[must_use = "call build() to obtain the plan"]
pub struct QueryPlanBuilder {
    entities: Vec<String>,
    select: Vec<FieldRef>,
    filters: Vec<Filter>,
    group_by: Vec<FieldRef>,
    order_by: Vec<OrderItem>,
    limit: Option<u64>,
    errors: Vec<StructuralError>,
}

impl QueryPlanBuilder {
    pub fn entity(mut self, id: &str) -> Self {
        self.entities.push(id.to_string());
        self
    }

    pub fn select(mut self, field: &str) -> Self {
        match field.parse() {
            Ok(f) => self.select.push(f),
            Err(e) => self.errors.push(e),
        }
        self
    }

    pub fn filter(mut self, field: &str, op: FilterOp, value: impl Into<FilterValue>) -> Self {
        self.push_filter(field, op, Some(value.into()));
        self
    }

    pub fn filter_null(mut self, field: &str, negated: bool) -> Self {
        let op = if negated {
            FilterOp::IsNotNull
        } else {
            FilterOp::IsNull
        };
        self.push_filter(field, op, None);
        self
    }

    pub fn filter_in(mut self, field: &str, values: Vec<FilterValue>) -> Self {
        self.push_filter(field, FilterOp::In, Some(FilterValue::List(values)));
        self
    }

    fn push_filter(&mut self, field: &str, op: FilterOp, value: Option<FilterValue>) {
        match field.parse() {
            Ok(field) => self.filters.push(Filter { field, op, value }),
            Err(e) => self.errors.push(e),
        }
    }

    pub fn group_by(mut self, field: &str) -> Self {
        match field.parse() {
            Ok(f) => self.group_by.push(f),
            Err(e) => self.errors.push(e),
        }
        self
    }

    pub fn order_by(mut self, field: &str, descending: bool) -> Self {
        match field.parse() {
            Ok(field) => self.order_by.push(OrderItem { field, descending }),
            Err(e) => self.errors.push(e),
        }
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Run the structural checks and produce the plan.
    ///
    /// When no entity is named explicitly, the entities of the selected
    /// fields are used.
    pub fn build(self) -> Result<QueryPlan, StructuralError> {
        if let Some(e) = self.errors.into_iter().next() {
            return Err(e);
        }

        let mut entities: Vec<String> = Vec::new();
        for id in &self.entities {
            if !entities.contains(id) {
                entities.push(id.clone());
            }
        }
        if entities.is_empty() {
            for f in &self.select {
                if !entities.contains(&f.entity) {
                    entities.push(f.entity.clone());
                }
            }
        }
        if entities.is_empty() {
            return Err(StructuralError::EmptyEntities);
        }
        if self.select.is_empty() {
            return Err(StructuralError::EmptySelection);
        }
        if self.limit == Some(0) {
            return Err(StructuralError::InvalidLimit(0));
        }

        let all_fields = self
            .select
            .iter()
            .chain(self.filters.iter().map(|f| &f.field))
            .chain(self.group_by.iter())
            .chain(self.order_by.iter().map(|o| &o.field));
        for field in all_fields {
            if !entities.contains(&field.entity) {
                return Err(StructuralError::FieldOutsidePlan {
                    field: field.to_string(),
                    entity: field.entity.clone(),
                });
            }
        }

        for (i, field) in self.select.iter().enumerate() {
            if self.select[..i].contains(field) {
                return Err(StructuralError::DuplicateSelection(field.to_string()));
            }
        }

        for (index, filter) in self.filters.iter().enumerate() {
            filter
                .check_shape()
                .map_err(|reason| StructuralError::InvalidFilter { index, reason })?;
        }

        Ok(QueryPlan {
            entities,
            select: self.select,
            filters: self.filters,
            group_by: self.group_by,
            order_by: self.order_by,
            limit: self.limit,
        })
    }
}

// =============================================================================
// Proposal boundary
// =============================================================================

/// Loosely typed plan as proposed by an external reasoner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanProposal {
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub select: Vec<String>,
    #[serde(default)]
    pub filters: Vec<FilterProposal>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<OrderProposal>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl PlanProposal {
    pub fn from_json(json: &str) -> Result<Self, StructuralError> {
        serde_json::from_str(json).map_err(|e| StructuralError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterProposal {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderProposal {
    pub field: String,
    #[serde(default)]
    pub direction: Option<String>,
}
