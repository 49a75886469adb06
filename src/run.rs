//! Run orchestration.
//!
//! A [`Run`] owns one [`PhaseController`] and drives a single request from
//! plan proposal to report. Every stage goes through the controller, so a
//! run that tries an operation outside its phase, or exceeds its step
//! ceiling, stops with a structural error instead of continuing.

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::catalog::SemanticCatalog;
use crate::config::Settings;
use crate::error::{Error, ErrorClass};
use crate::execution::{
    Attempt, HeuristicReformulator, Reformulator, RepairLoop, RowSet, SqlBackend,
};
use crate::phase::{Capability, PhaseController, PhaseState, Signal, TerminalReason};
use crate::planner::{
    CostEstimate, CostEstimator, JoinPathFinder, PlanProposal, QueryPlan, StatementBuilder,
};
use crate::security::{SecurityValidator, ValidatedStatement};

/// Outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub id: Uuid,
    pub final_phase: PhaseState,
    pub terminal_reason: Option<TerminalReason>,
    /// Phases entered, in order.
    pub phases: Vec<PhaseState>,
    /// Class of the error that ended the run, if any.
    pub error_class: Option<ErrorClass>,
    pub error: Option<String>,
    /// Text of the last statement built or attempted.
    pub statement_text: Option<String>,
    pub attempts: Vec<Attempt>,
    pub estimate: Option<CostEstimate>,
    /// Whether the estimate exceeded the configured warning threshold.
    pub cost_warning: bool,
    pub rows: Option<RowSet>,
}

impl RunReport {
    fn new(id: Uuid) -> Self {
        Self {
            id,
            final_phase: PhaseState::Planning,
            terminal_reason: None,
            phases: vec![],
            error_class: None,
            error: None,
            statement_text: None,
            attempts: vec![],
            estimate: None,
            cost_warning: false,
            rows: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error_class.is_none() && self.terminal_reason == Some(TerminalReason::Completed)
    }
}

/// One request against a shared catalog, policy and backend.
pub struct Run<'a> {
    id: Uuid,
    catalog: &'a SemanticCatalog,
    settings: &'a Settings,
    backend: &'a dyn SqlBackend,
    reformulator: &'a dyn Reformulator,
    controller: PhaseController,
}

impl<'a> Run<'a> {
    pub fn new(
        catalog: &'a SemanticCatalog,
        settings: &'a Settings,
        backend: &'a dyn SqlBackend,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            catalog,
            settings,
            backend,
            reformulator: &HeuristicReformulator,
            controller: PhaseController::new(settings.phase.step_ceiling),
        }
    }

    pub fn with_reformulator(mut self, reformulator: &'a dyn Reformulator) -> Self {
        self.reformulator = reformulator;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Drive a proposal through every phase and report the outcome.
    pub async fn execute(mut self, proposal: &PlanProposal) -> RunReport {
        let span = tracing::info_span!("run", id = %self.id);
        let mut report = RunReport::new(self.id);

        let result = self.drive(proposal, &mut report).instrument(span.clone()).await;
        span.in_scope(|| self.finish(result, report))
    }

    fn finish(&mut self, result: Result<(), Error>, mut report: RunReport) -> RunReport {
        if let Err(err) = result {
            let class = err.class();
            tracing::warn!(class = %class, error = %err, "run failed");
            if !self.controller.is_terminal() {
                let signal = match class {
                    ErrorClass::Plan | ErrorClass::JoinResolution => Signal::ClarificationNeeded,
                    _ => Signal::Abort,
                };
                // Terminating signals are accepted in every non-terminal phase.
                let _ = self.controller.signal(signal);
            }
            report.error_class = Some(class);
            report.error = Some(err.to_string());
        }

        report.final_phase = self.controller.state();
        report.terminal_reason = self.controller.terminal_reason();
        report.phases = self.controller.history().to_vec();
        tracing::info!(
            phase = %report.final_phase,
            attempts = report.attempts.len(),
            succeeded = report.succeeded(),
            "run finished"
        );
        report
    }

    async fn drive(&mut self, proposal: &PlanProposal, report: &mut RunReport) -> Result<(), Error> {
        // Planning
        self.controller.invoke(Capability::SubmitPlan)?;
        let plan = QueryPlan::try_from_proposal(proposal)?;

        self.controller.invoke(Capability::ResolveJoinPath)?;
        let path = JoinPathFinder::new(self.catalog)
            .with_tie_break(self.settings.compiler.tie_break)
            .resolve(&plan)?;
        self.controller.signal(Signal::PlanFinalized)?;

        // Building
        self.controller.invoke(Capability::BuildStatement)?;
        let statement = StatementBuilder::new(self.catalog).build(&plan, &path)?;
        let dialect = self.backend.dialect();
        report.statement_text = Some(statement.to_sql(dialect));

        self.controller.invoke(Capability::ValidateStatement)?;
        let validator = SecurityValidator::new(&self.settings.security);
        let validated = validator.validate(&statement)?;
        report.statement_text = Some(validated.statement().to_sql(dialect));

        self.controller.invoke(Capability::EstimateCost)?;
        self.estimate(&validated, report);
        self.controller.signal(Signal::BuildFinalized)?;

        // Execution
        self.controller.invoke(Capability::ExecuteStatement)?;
        let session = RepairLoop::new(self.backend, &validator, self.reformulator)
            .with_config(self.settings.execution.repair_config())
            .run(validated)
            .await;
        report.attempts = session.attempts().to_vec();
        if let Some(last) = session.attempts().last() {
            report.statement_text = Some(last.sql.clone());
        }
        report.rows = Some(session.into_result()?);
        self.controller.signal(Signal::ExecutionCompleted)?;

        // Reporting
        self.controller.invoke(Capability::Report)?;
        self.controller.signal(Signal::ReportFinalized)?;
        Ok(())
    }

    fn estimate(&self, validated: &ValidatedStatement, report: &mut RunReport) {
        let estimate = CostEstimator::new(self.catalog).estimate(validated.statement());
        let threshold = self.settings.phase.cost_warning_rows;
        report.cost_warning = estimate.approximate_rows > threshold;
        if report.cost_warning {
            tracing::warn!(
                rows = estimate.approximate_rows,
                threshold,
                "estimated result exceeds cost warning threshold"
            );
        }
        report.estimate = Some(estimate);
    }
}
