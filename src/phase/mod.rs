//! Phase controller - the per-run finite-state machine.
//!
//! A run moves forward through Planning, Building, Execution and Reporting
//! and ends in Terminal. Each phase exposes a fixed [`CapabilitySet`]; the
//! caller asks what is callable now instead of tools registering themselves.

mod controller;
mod error;
mod state;

pub use controller::{PhaseController, DEFAULT_STEP_CEILING};
pub use error::PhaseError;
pub use state::{Capability, CapabilitySet, PhaseState, Signal, TerminalReason};
