// tests/run/run_test.rs
#[path = "../common/mod.rs"]
mod common;

use querywright::config::Settings;
use querywright::execution::{FailureClass, NoReformulation};
use querywright::phase::{PhaseState, TerminalReason};
use querywright::planner::PlanProposal;
use querywright::run::{Run, RunReport};
use querywright::security::SecurityPolicy;
use querywright::ErrorClass;

fn settings() -> Settings {
    Settings {
        security: common::policy(),
        ..Settings::default()
    }
}

fn proposal(json: &str) -> PlanProposal {
    PlanProposal::from_json(json).unwrap()
}

async fn run_with(settings: &Settings, json: &str) -> RunReport {
    let catalog = common::catalog();
    let backend = common::seeded_backend();
    Run::new(&catalog, settings, &backend)
        .execute(&proposal(json))
        .await
}

const ALL_PHASES: [PhaseState; 5] = [
    PhaseState::Planning,
    PhaseState::Building,
    PhaseState::Execution,
    PhaseState::Reporting,
    PhaseState::Terminal,
];

#[tokio::test]
async fn test_demo_plan_completes_after_repair() {
    // The seeded table has no region column; the filter on it is dropped.
    let report = run_with(&settings(), include_str!("../../demos/plan.json")).await;

    assert!(report.succeeded(), "{:?}", report.error);
    assert_eq!(report.phases, ALL_PHASES);
    assert_eq!(report.terminal_reason, Some(TerminalReason::Completed));
    assert_eq!(report.attempts.len(), 2);
    assert_eq!(
        report.attempts[0].failure.as_ref().map(|f| f.class),
        Some(FailureClass::MissingObject)
    );

    let rows = report.rows.as_ref().unwrap();
    assert_eq!(rows.column_names(), vec!["industry", "revenue"]);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.rows[0][0], serde_json::json!("Software"));

    let estimate = report.estimate.unwrap();
    assert!(estimate.approximate_rows <= 10);
    assert!(!report.cost_warning);
    assert!(!report.statement_text.unwrap().contains("region"));
}

#[tokio::test]
async fn test_clean_plan_needs_one_attempt() {
    let report = run_with(
        &settings(),
        r#"{
            "entities": ["Company", "Person"],
            "select": ["Company.name", "Person.headcount"],
            "group_by": ["Company.name"],
            "limit": 5
        }"#,
    )
    .await;
    assert!(report.succeeded());
    assert_eq!(report.attempts.len(), 1);
    assert_eq!(report.rows.unwrap().len(), 2);
}

#[tokio::test]
async fn test_disconnected_entities_ask_for_clarification() {
    let report = run_with(
        &settings(),
        r#"{"entities": ["Company", "Weather"],
            "select": ["Company.industry", "Weather.temperature"],
            "group_by": ["Company.industry"]}"#,
    )
    .await;

    assert!(!report.succeeded());
    assert_eq!(report.error_class, Some(ErrorClass::JoinResolution));
    assert_eq!(report.terminal_reason, Some(TerminalReason::ClarificationNeeded));
    assert_eq!(report.phases, [PhaseState::Planning, PhaseState::Terminal]);
    assert!(report.error.unwrap().contains("Weather"));
    assert!(report.attempts.is_empty());
}

#[tokio::test]
async fn test_plan_errors_ask_for_clarification() {
    let report = run_with(
        &settings(),
        r#"{"entities": ["Company"],
            "select": ["Company.industry", "Company.revenue"]}"#,
    )
    .await;
    assert_eq!(report.error_class, Some(ErrorClass::Plan));
    assert_eq!(report.terminal_reason, Some(TerminalReason::ClarificationNeeded));
    assert_eq!(report.final_phase, PhaseState::Terminal);
    assert!(report.statement_text.is_none());
}

#[tokio::test]
async fn test_structural_errors_abort() {
    let report = run_with(
        &settings(),
        r#"{"entities": ["Company"], "select": ["Company.name"], "limit": 0}"#,
    )
    .await;
    assert_eq!(report.error_class, Some(ErrorClass::Structural));
    assert_eq!(report.terminal_reason, Some(TerminalReason::Aborted));
    assert_eq!(report.phases, [PhaseState::Planning, PhaseState::Terminal]);
}

#[tokio::test]
async fn test_policy_rejection_aborts_before_execution() {
    let settings = Settings {
        security: SecurityPolicy::default().with_allowed_tables(["companies"]),
        ..Settings::default()
    };
    let report = run_with(
        &settings,
        r#"{"entities": ["Company", "Person"],
            "select": ["Company.name", "Person.title"]}"#,
    )
    .await;

    assert_eq!(report.error_class, Some(ErrorClass::Policy));
    assert_eq!(report.terminal_reason, Some(TerminalReason::Aborted));
    assert_eq!(
        report.phases,
        [PhaseState::Planning, PhaseState::Building, PhaseState::Terminal]
    );
    assert!(report.attempts.is_empty());
    assert!(report.rows.is_none());
}

#[tokio::test]
async fn test_exhausted_repair_aborts() {
    let catalog = common::catalog();
    let backend = common::seeded_backend();
    let settings = settings();
    let report = Run::new(&catalog, &settings, &backend)
        .with_reformulator(&NoReformulation)
        .execute(&proposal(
            r#"{"entities": ["Company"], "select": ["Company.region"]}"#,
        ))
        .await;

    assert_eq!(report.error_class, Some(ErrorClass::Database));
    assert_eq!(report.terminal_reason, Some(TerminalReason::Aborted));
    assert_eq!(report.attempts.len(), 1);
    assert_eq!(
        report.phases,
        [
            PhaseState::Planning,
            PhaseState::Building,
            PhaseState::Execution,
            PhaseState::Terminal
        ]
    );
}

#[tokio::test]
async fn test_cost_warning_does_not_block() {
    let mut settings = settings();
    settings.phase.cost_warning_rows = 10;
    let report = run_with(
        &settings,
        r#"{"entities": ["Person"], "select": ["Person.name"]}"#,
    )
    .await;

    assert!(report.succeeded());
    assert!(report.cost_warning);
    // Unbounded requests are clamped to the policy maximum.
    assert_eq!(report.estimate.unwrap().approximate_rows, 1000);
    assert!(report.attempts[0].clamped);
    assert!(report.statement_text.unwrap().ends_with("LIMIT 1000"));
}

#[tokio::test]
async fn test_step_ceiling_ends_the_run() {
    let mut settings = settings();
    settings.phase.step_ceiling = 3;
    let report = run_with(&settings, include_str!("../../demos/plan.json")).await;

    assert_eq!(report.terminal_reason, Some(TerminalReason::StepCeiling));
    assert_eq!(report.error_class, Some(ErrorClass::Structural));
    assert!(report.attempts.is_empty());
}

#[tokio::test]
async fn test_report_serializes() {
    let report = run_with(&settings(), include_str!("../../demos/plan.json")).await;
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["final_phase"], "terminal");
    assert_eq!(json["terminal_reason"], "completed");
    assert_eq!(json["attempts"][0]["failure"]["class"], "missing_object");
    assert!(json["attempts"][0]["elapsed_ms"].is_u64());
    assert_eq!(json["id"], report.id.to_string());
}
