//! # querywright
//!
//! A semantic SQL compiler: structured query plans over a catalog of
//! business entities become validated, read-only SQL, executed with a
//! bounded repair loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          SemanticCatalog (entities, joins, stats)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner]
//! ┌─────────────────────────────────────────────────────────┐
//! │   PlanProposal → QueryPlan → JoinPath → SqlStatement     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [security]
//! ┌─────────────────────────────────────────────────────────┐
//! │       ValidatedStatement (+ advisory CostEstimate)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [execution]
//! ┌─────────────────────────────────────────────────────────┐
//! │          RepairLoop over a SqlBackend → RowSet           │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! A [`run::Run`] drives one request through these stages under a
//! [`phase::PhaseController`].

pub mod catalog;
pub mod compile;
pub mod config;
pub mod error;
pub mod execution;
pub mod phase;
pub mod planner;
pub mod run;
pub mod security;
pub mod sql;

pub use error::{Error, ErrorClass, Result};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::catalog::{CatalogDefinition, Entity, SemanticCatalog};
    pub use crate::compile::{compile_plan, validate_sql, CompileOptions, CompileOutput};
    pub use crate::config::Settings;
    pub use crate::error::{Error, ErrorClass};
    pub use crate::execution::{
        HeuristicReformulator, Reformulator, RepairConfig, RepairLoop, RepairState, RowSet,
        SqlBackend, SqliteBackend,
    };
    pub use crate::phase::{Capability, CapabilitySet, PhaseController, PhaseState, Signal};
    pub use crate::planner::{
        CostEstimate, CostEstimator, JoinPath, JoinPathFinder, PlanProposal, QueryPlan,
        StatementBuilder, TieBreak,
    };
    pub use crate::run::{Run, RunReport};
    pub use crate::security::{SecurityPolicy, SecurityValidator, ValidatedStatement};
    pub use crate::sql::{Dialect, Query, SqlStatement, StatementKind};
}
