//! Phase states, signals and capabilities.

use std::fmt;

use serde::Serialize;

/// Phase of a run. Ordered: a run only ever moves to a later phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    Planning,
    Building,
    Execution,
    Reporting,
    Terminal,
}

impl PhaseState {
    /// The phase reached by this phase's completion signal.
    pub fn next(self) -> PhaseState {
        match self {
            PhaseState::Planning => PhaseState::Building,
            PhaseState::Building => PhaseState::Execution,
            PhaseState::Execution => PhaseState::Reporting,
            PhaseState::Reporting | PhaseState::Terminal => PhaseState::Terminal,
        }
    }

    /// The signal that completes this phase.
    pub fn completion_signal(self) -> Option<Signal> {
        match self {
            PhaseState::Planning => Some(Signal::PlanFinalized),
            PhaseState::Building => Some(Signal::BuildFinalized),
            PhaseState::Execution => Some(Signal::ExecutionCompleted),
            PhaseState::Reporting => Some(Signal::ReportFinalized),
            PhaseState::Terminal => None,
        }
    }

    pub fn capabilities(self) -> CapabilitySet {
        use Capability::*;
        match self {
            PhaseState::Planning => {
                CapabilitySet::of(&[SearchEntities, LookupEntity, ResolveJoinPath, SubmitPlan])
            }
            PhaseState::Building => CapabilitySet::of(&[
                LookupEntity,
                ResolveJoinPath,
                BuildStatement,
                ValidateStatement,
                EstimateCost,
            ]),
            PhaseState::Execution => {
                CapabilitySet::of(&[ValidateStatement, EstimateCost, ExecuteStatement])
            }
            PhaseState::Reporting => CapabilitySet::of(&[Report]),
            PhaseState::Terminal => CapabilitySet::empty(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PhaseState::Planning => "planning",
            PhaseState::Building => "building",
            PhaseState::Execution => "execution",
            PhaseState::Reporting => "reporting",
            PhaseState::Terminal => "terminal",
        }
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion and abort signals from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    PlanFinalized,
    BuildFinalized,
    ExecutionCompleted,
    ReportFinalized,
    /// The request can be answered without data; skip to Terminal.
    NoData,
    ClarificationNeeded,
    Abort,
}

impl Signal {
    pub const ALL: [Signal; 7] = [
        Signal::PlanFinalized,
        Signal::BuildFinalized,
        Signal::ExecutionCompleted,
        Signal::ReportFinalized,
        Signal::NoData,
        Signal::ClarificationNeeded,
        Signal::Abort,
    ];

    /// Signals that end the run from any phase.
    pub fn is_terminating(self) -> bool {
        matches!(
            self,
            Signal::NoData | Signal::ClarificationNeeded | Signal::Abort
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Signal::PlanFinalized => "plan-finalized",
            Signal::BuildFinalized => "build-finalized",
            Signal::ExecutionCompleted => "execution-completed",
            Signal::ReportFinalized => "report-finalized",
            Signal::NoData => "no-data",
            Signal::ClarificationNeeded => "clarification-needed",
            Signal::Abort => "abort",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signal::ALL
            .into_iter()
            .find(|sig| sig.as_str() == s)
            .ok_or_else(|| format!("unknown signal: {s}"))
    }
}

/// Why a run reached Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    Completed,
    NoData,
    ClarificationNeeded,
    Aborted,
    StepCeiling,
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminalReason::Completed => "completed",
            TerminalReason::NoData => "no data",
            TerminalReason::ClarificationNeeded => "clarification needed",
            TerminalReason::Aborted => "aborted",
            TerminalReason::StepCeiling => "step ceiling reached",
        };
        f.write_str(s)
    }
}

/// A component operation a caller may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Capability {
    SearchEntities,
    LookupEntity,
    ResolveJoinPath,
    SubmitPlan,
    BuildStatement,
    ValidateStatement,
    EstimateCost,
    ExecuteStatement,
    Report,
}

impl Capability {
    pub const ALL: [Capability; 9] = [
        Capability::SearchEntities,
        Capability::LookupEntity,
        Capability::ResolveJoinPath,
        Capability::SubmitPlan,
        Capability::BuildStatement,
        Capability::ValidateStatement,
        Capability::EstimateCost,
        Capability::ExecuteStatement,
        Capability::Report,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::SearchEntities => "search_entities",
            Capability::LookupEntity => "lookup_entity",
            Capability::ResolveJoinPath => "resolve_join_path",
            Capability::SubmitPlan => "submit_plan",
            Capability::BuildStatement => "build_statement",
            Capability::ValidateStatement => "validate_statement",
            Capability::EstimateCost => "estimate_cost",
            Capability::ExecuteStatement => "execute_statement",
            Capability::Report => "report",
        }
    }

    fn bit(self) -> u16 {
        1 << (self as u8)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable set of capabilities.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn of(caps: &[Capability]) -> Self {
        Self(caps.iter().fold(0, |bits, c| bits | c.bit()))
    }

    pub fn contains(&self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for CapabilitySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
