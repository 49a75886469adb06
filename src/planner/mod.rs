//! Query planner - turns a structured plan into a typed SQL statement.
//!
//! Three stages, each a pure function of the catalog:
//! 1. Plan validation: proposal → [`QueryPlan`] (structural checks only)
//! 2. Join resolution: [`QueryPlan`] → [`JoinPath`] over the catalog graph
//! 3. Statement building: plan + path → [`SqlStatement`](crate::sql::SqlStatement)
//!
//! [`CostEstimator`] then produces an advisory estimate for any statement.

pub mod builder;
pub mod cost;
pub mod error;
pub mod join_path;
pub mod plan;

pub use builder::StatementBuilder;
pub use cost::{CostEstimate, CostEstimator};
pub use error::{JoinPathError, PlanError, StructuralError};
pub use join_path::{JoinPath, JoinPathFinder, JoinStep, TieBreak};
pub use plan::{
    FieldRef, Filter, FilterOp, FilterProposal, FilterValue, OrderItem, OrderProposal,
    PlanProposal, QueryPlan, QueryPlanBuilder,
};
