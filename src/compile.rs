//! End-to-end compilation from a plan proposal to SQL, without execution.
//!
//! ```text
//! PlanProposal → QueryPlan → JoinPath → SqlStatement → Validation → SQL
//! ```
//!
//! # Example
//!
//! ```ignore
//! use querywright::catalog::SemanticCatalog;
//! use querywright::compile::{compile_plan, CompileOptions};
//! use querywright::planner::PlanProposal;
//! use querywright::security::SecurityPolicy;
//!
//! let catalog = SemanticCatalog::from_file("catalog.json")?;
//! let proposal = PlanProposal::from_json(r#"{
//!     "entities": ["Company"],
//!     "select": ["Company.industry", "Company.revenue"],
//!     "group_by": ["Company.industry"]
//! }"#)?;
//!
//! let policy = SecurityPolicy::for_catalog(&catalog);
//! let output = compile_plan(&catalog, &policy, &proposal, CompileOptions::default())?;
//! println!("{}", output.sql);
//! ```

use crate::catalog::SemanticCatalog;
use crate::error::Result;
use crate::planner::{
    CostEstimate, CostEstimator, JoinPath, JoinPathFinder, PlanProposal, QueryPlan,
    StatementBuilder, TieBreak,
};
use crate::security::{SecurityPolicy, SecurityValidator, ValidatedStatement};
use crate::sql::{parse_statement, Dialect};

/// Options for compilation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// SQL dialect to generate.
    pub dialect: Dialect,
    /// Tie-break rule for equally short join trees.
    pub tie_break: TieBreak,
}

impl CompileOptions {
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }
}

/// Result of compiling a plan.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// The generated SQL string, after policy clamping.
    pub sql: String,
    pub plan: QueryPlan,
    pub path: JoinPath,
    pub statement: ValidatedStatement,
    pub estimate: CostEstimate,
    pub dialect: Dialect,
}

/// Compile a proposal to validated SQL text.
pub fn compile_plan(
    catalog: &SemanticCatalog,
    policy: &SecurityPolicy,
    proposal: &PlanProposal,
    options: CompileOptions,
) -> Result<CompileOutput> {
    let plan = QueryPlan::try_from_proposal(proposal)?;
    let path = JoinPathFinder::new(catalog)
        .with_tie_break(options.tie_break)
        .resolve(&plan)?;
    let statement = StatementBuilder::new(catalog).build(&plan, &path)?;
    let statement = SecurityValidator::new(policy).validate(&statement)?;
    let estimate = CostEstimator::new(catalog).estimate(statement.statement());

    Ok(CompileOutput {
        sql: statement.statement().to_sql(options.dialect),
        plan,
        path,
        statement,
        estimate,
        dialect: options.dialect,
    })
}

/// Lower proposed SQL text and check it against a policy.
pub fn validate_sql(text: &str, policy: &SecurityPolicy, dialect: Dialect) -> Result<ValidatedStatement> {
    let statement = parse_statement(text, dialect)?;
    Ok(SecurityValidator::new(policy).validate(&statement)?)
}
