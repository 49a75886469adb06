use thiserror::Error;

use super::state::{Capability, PhaseState, Signal};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseError {
    #[error("{capability} is not available during {phase}")]
    CapabilityUnavailable {
        capability: Capability,
        phase: PhaseState,
    },

    #[error("signal {signal} is not recognized during {phase}")]
    UnexpectedSignal { signal: Signal, phase: PhaseState },

    #[error("run has already terminated")]
    Terminated,
}
