//! The phase controller.

use super::error::PhaseError;
use super::state::{Capability, CapabilitySet, PhaseState, Signal, TerminalReason};

/// Operations and signals allowed per run when none is configured.
pub const DEFAULT_STEP_CEILING: u32 = 100;

/// Forward-only phase machine for one run.
///
/// Every operation and every signal counts as a step, accepted or not. When
/// the step count reaches the ceiling the run is forced into Terminal.
#[derive(Debug, Clone)]
pub struct PhaseController {
    state: PhaseState,
    steps: u32,
    ceiling: u32,
    history: Vec<PhaseState>,
    reason: Option<TerminalReason>,
}

impl Default for PhaseController {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_CEILING)
    }
}

impl PhaseController {
    pub fn new(step_ceiling: u32) -> Self {
        Self {
            state: PhaseState::Planning,
            steps: 0,
            ceiling: step_ceiling.max(1),
            history: vec![PhaseState::Planning],
            reason: None,
        }
    }

    pub fn state(&self) -> PhaseState {
        self.state
    }

    /// What the caller may invoke now.
    pub fn capabilities(&self) -> CapabilitySet {
        self.state.capabilities()
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn step_ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Phases entered, in order, starting with Planning.
    pub fn history(&self) -> &[PhaseState] {
        &self.history
    }

    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        self.reason
    }

    pub fn is_terminal(&self) -> bool {
        self.state == PhaseState::Terminal
    }

    /// Record an operation. Fails when the current phase does not offer it.
    pub fn invoke(&mut self, capability: Capability) -> Result<(), PhaseError> {
        if self.is_terminal() {
            return Err(PhaseError::Terminated);
        }
        let phase = self.state;
        let allowed = self.capabilities().contains(capability);
        self.count_step();

        if allowed {
            tracing::trace!(%capability, %phase, step = self.steps, "operation");
            Ok(())
        } else {
            Err(PhaseError::CapabilityUnavailable { capability, phase })
        }
    }

    /// Apply a signal and return the resulting phase.
    ///
    /// A completion signal advances exactly one phase; a terminating signal
    /// ends the run from any phase.
    pub fn signal(&mut self, signal: Signal) -> Result<PhaseState, PhaseError> {
        if self.is_terminal() {
            return Err(PhaseError::Terminated);
        }
        let phase = self.state;

        let outcome = if signal.is_terminating() {
            let reason = match signal {
                Signal::NoData => TerminalReason::NoData,
                Signal::ClarificationNeeded => TerminalReason::ClarificationNeeded,
                _ => TerminalReason::Aborted,
            };
            self.terminate(reason);
            Ok(self.state)
        } else if phase.completion_signal() == Some(signal) {
            let next = phase.next();
            if next == PhaseState::Terminal {
                self.terminate(TerminalReason::Completed);
            } else {
                self.enter(next);
            }
            Ok(self.state)
        } else {
            Err(PhaseError::UnexpectedSignal { signal, phase })
        };

        self.count_step();
        outcome.map(|_| self.state)
    }

    fn count_step(&mut self) {
        self.steps += 1;
        if self.steps >= self.ceiling && !self.is_terminal() {
            tracing::warn!(
                steps = self.steps,
                phase = %self.state,
                "step ceiling reached; terminating run"
            );
            self.terminate(TerminalReason::StepCeiling);
        }
    }

    fn enter(&mut self, next: PhaseState) {
        debug_assert!(next > self.state);
        tracing::debug!(from = %self.state, to = %next, "phase transition");
        self.state = next;
        self.history.push(next);
    }

    fn terminate(&mut self, reason: TerminalReason) {
        self.reason = Some(reason);
        self.enter(PhaseState::Terminal);
    }
}
