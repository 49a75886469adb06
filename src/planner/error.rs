//! Planner error taxonomy.
//!
//! Three distinct failures live here, and callers handle them differently:
//!
//! - [`StructuralError`]: the proposed plan is malformed. Fatal, never retried.
//! - [`JoinPathError`]: the requested entities cannot be connected. The caller
//!   has to narrow the request.
//! - [`PlanError`]: the plan is well-formed but does not fit the catalog
//!   (unknown field, type mismatch, ambiguous aggregation). Reported for
//!   revision, never retried automatically.

use thiserror::Error;

use crate::catalog::ValueType;

/// Malformed plan proposal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("malformed plan proposal: {0}")]
    Malformed(String),

    #[error("plan references no entities")]
    EmptyEntities,

    #[error("plan selects no fields")]
    EmptySelection,

    #[error("invalid field reference {0:?}: expected Entity.field")]
    InvalidFieldRef(String),

    #[error("field {field} belongs to entity {entity}, which the plan does not reference")]
    FieldOutsidePlan { field: String, entity: String },

    #[error("field {0} is selected more than once")]
    DuplicateSelection(String),

    #[error("unknown filter operator: {0}")]
    UnknownOperator(String),

    #[error("filter {index}: {reason}")]
    InvalidFilter { index: usize, reason: String },

    #[error("unknown sort direction: {0}")]
    InvalidDirection(String),

    #[error("row limit must be positive, got {0}")]
    InvalidLimit(i64),
}

/// Join resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinPathError {
    #[error("no entities requested")]
    EmptyRequest,

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("entities cannot be joined; unreachable: {}", unreachable.join(", "))]
    Disconnected { unreachable: Vec<String> },

    #[error("no join path from {from} to {to}")]
    NoPath { from: String, to: String },
}

/// A well-formed plan that does not compile against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("unknown field {field} on entity {entity}")]
    UnknownField { entity: String, field: String },

    #[error("entity {0} is not covered by the join path")]
    EntityNotInPath(String),

    #[error("filter on {field}: expected a {expected} value, got {found}")]
    TypeMismatch {
        field: String,
        expected: ValueType,
        found: String,
    },

    #[error("filter on {field}: {value:?} is outside the dimension's domain")]
    ValueOutsideDomain { field: String, value: String },

    #[error("operator {op} cannot be applied to {field} ({value_type})")]
    OperatorNotApplicable {
        field: String,
        op: String,
        value_type: ValueType,
    },

    #[error("cannot filter on measure {0}; only dimensions are filterable")]
    FilterOnMeasure(String),

    #[error("dimension {0} is selected alongside measures but is not in the grouping")]
    AmbiguousAggregation(String),

    #[error("grouping field {0} is not selected")]
    GroupingNotSelected(String),

    #[error("measure {0} cannot be a grouping field")]
    MeasureInGroupBy(String),

    #[error("ordering field {0} is not selected")]
    OrderNotSelected(String),
}
