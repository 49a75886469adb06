// tests/phase/phase_controller_test.rs
use querywright::phase::{
    Capability, PhaseController, PhaseError, PhaseState, Signal, TerminalReason,
    DEFAULT_STEP_CEILING,
};

fn completed_run(controller: &mut PhaseController) {
    for signal in [
        Signal::PlanFinalized,
        Signal::BuildFinalized,
        Signal::ExecutionCompleted,
        Signal::ReportFinalized,
    ] {
        controller.signal(signal).unwrap();
    }
}

#[test]
fn test_full_forward_run() {
    let mut controller = PhaseController::default();
    assert_eq!(controller.state(), PhaseState::Planning);
    assert_eq!(controller.step_ceiling(), DEFAULT_STEP_CEILING);

    completed_run(&mut controller);

    assert_eq!(
        controller.history(),
        [
            PhaseState::Planning,
            PhaseState::Building,
            PhaseState::Execution,
            PhaseState::Reporting,
            PhaseState::Terminal,
        ]
    );
    assert_eq!(controller.terminal_reason(), Some(TerminalReason::Completed));
    assert_eq!(controller.steps(), 4);
}

#[test]
fn test_phases_only_move_forward() {
    let mut controller = PhaseController::default();
    controller.signal(Signal::PlanFinalized).unwrap();
    controller.signal(Signal::BuildFinalized).unwrap();

    for earlier in [Signal::PlanFinalized, Signal::BuildFinalized] {
        assert_eq!(
            controller.signal(earlier),
            Err(PhaseError::UnexpectedSignal {
                signal: earlier,
                phase: PhaseState::Execution
            })
        );
        assert_eq!(controller.state(), PhaseState::Execution);
    }

    // No skipping ahead either.
    assert!(controller.signal(Signal::ReportFinalized).is_err());
    assert_eq!(controller.state(), PhaseState::Execution);

    let history = controller.history();
    assert!(history.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_capabilities_follow_the_phase() {
    let mut controller = PhaseController::default();
    assert!(controller.invoke(Capability::SearchEntities).is_ok());
    assert_eq!(
        controller.invoke(Capability::ExecuteStatement),
        Err(PhaseError::CapabilityUnavailable {
            capability: Capability::ExecuteStatement,
            phase: PhaseState::Planning
        })
    );

    controller.signal(Signal::PlanFinalized).unwrap();
    assert!(controller.invoke(Capability::BuildStatement).is_ok());
    assert!(controller.invoke(Capability::SearchEntities).is_err());

    controller.signal(Signal::BuildFinalized).unwrap();
    assert!(controller.invoke(Capability::ExecuteStatement).is_ok());
    assert!(controller.invoke(Capability::BuildStatement).is_err());

    controller.signal(Signal::ExecutionCompleted).unwrap();
    assert_eq!(
        controller.capabilities().iter().collect::<Vec<_>>(),
        vec![Capability::Report]
    );
}

#[test]
fn test_every_capability_is_offered_somewhere() {
    let phases = [
        PhaseState::Planning,
        PhaseState::Building,
        PhaseState::Execution,
        PhaseState::Reporting,
    ];
    for cap in Capability::ALL {
        assert!(
            phases.iter().any(|p| p.capabilities().contains(cap)),
            "{cap} is unreachable"
        );
    }
    assert!(PhaseState::Terminal.capabilities().is_empty());
}

#[test]
fn test_terminating_signals_end_the_run_from_any_phase() {
    let reasons = [
        (Signal::NoData, TerminalReason::NoData),
        (Signal::ClarificationNeeded, TerminalReason::ClarificationNeeded),
        (Signal::Abort, TerminalReason::Aborted),
    ];
    for (signal, reason) in reasons {
        for advance in 0..4 {
            let mut controller = PhaseController::default();
            let completions = [
                Signal::PlanFinalized,
                Signal::BuildFinalized,
                Signal::ExecutionCompleted,
            ];
            for s in &completions[..advance.min(3)] {
                controller.signal(*s).unwrap();
            }
            assert_eq!(controller.signal(signal), Ok(PhaseState::Terminal));
            assert_eq!(controller.terminal_reason(), Some(reason));
        }
    }
}

#[test]
fn test_nothing_happens_after_terminal() {
    let mut controller = PhaseController::default();
    controller.signal(Signal::Abort).unwrap();
    let steps = controller.steps();

    assert_eq!(controller.invoke(Capability::Report), Err(PhaseError::Terminated));
    assert_eq!(controller.signal(Signal::PlanFinalized), Err(PhaseError::Terminated));
    assert_eq!(controller.signal(Signal::Abort), Err(PhaseError::Terminated));
    assert_eq!(controller.steps(), steps);
    assert_eq!(controller.terminal_reason(), Some(TerminalReason::Aborted));
}

#[test]
fn test_step_ceiling_forces_terminal() {
    let mut controller = PhaseController::default();
    for _ in 0..DEFAULT_STEP_CEILING - 1 {
        controller.invoke(Capability::SearchEntities).unwrap();
    }
    assert_eq!(controller.state(), PhaseState::Planning);

    // The hundredth step is accepted, then the run ends.
    controller.invoke(Capability::SearchEntities).unwrap();
    assert!(controller.is_terminal());
    assert_eq!(controller.terminal_reason(), Some(TerminalReason::StepCeiling));
    assert_eq!(controller.steps(), DEFAULT_STEP_CEILING);
    assert_eq!(
        controller.invoke(Capability::SearchEntities),
        Err(PhaseError::Terminated)
    );
}

#[test]
fn test_rejected_operations_count_as_steps() {
    let mut controller = PhaseController::new(3);
    assert!(controller.invoke(Capability::Report).is_err());
    assert!(controller.signal(Signal::ReportFinalized).is_err());
    assert_eq!(controller.steps(), 2);
    assert!(controller.invoke(Capability::Report).is_err());
    assert_eq!(controller.terminal_reason(), Some(TerminalReason::StepCeiling));
}

#[test]
fn test_signal_names() {
    for signal in Signal::ALL {
        assert_eq!(signal.as_str().parse::<Signal>(), Ok(signal));
    }
    assert!("finish".parse::<Signal>().is_err());
}
