//! Crate-level error type and error classes.

use serde::Serialize;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::SettingsError;
use crate::execution::{classify, BackendError, FailureClass, RepairError};
use crate::phase::PhaseError;
use crate::planner::{JoinPathError, PlanError, StructuralError};
use crate::security::PolicyViolation;
use crate::sql::ParseError;

/// Terminal error class surfaced to callers of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Malformed catalog, plan, SQL text or configuration. Never retried.
    Structural,
    /// The plan does not fit the catalog; revise and resubmit.
    Plan,
    /// A security rule was breached.
    Policy,
    /// The requested entities cannot be joined.
    JoinResolution,
    /// The database rejected the statement.
    Database,
    /// The database call did not complete in time.
    Timeout,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorClass::Structural => "structural",
            ErrorClass::Plan => "plan",
            ErrorClass::Policy => "policy",
            ErrorClass::JoinResolution => "join-resolution",
            ErrorClass::Database => "database",
            ErrorClass::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    JoinPath(#[from] JoinPathError),

    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Repair(#[from] RepairError),

    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Catalog(e) if e.is_structural() => ErrorClass::Structural,
            Error::Catalog(_) | Error::Plan(_) => ErrorClass::Plan,
            Error::Structural(_)
            | Error::Phase(_)
            | Error::Settings(_)
            | Error::Parse(_) => ErrorClass::Structural,
            Error::JoinPath(_) => ErrorClass::JoinResolution,
            Error::Policy(_) | Error::Repair(RepairError::Policy(_)) => ErrorClass::Policy,
            Error::Repair(RepairError::Timeout(_)) => ErrorClass::Timeout,
            Error::Repair(RepairError::Database { class, .. }) => database_class(*class),
            Error::Backend(e) => database_class(classify(e).class),
        }
    }
}

fn database_class(class: FailureClass) -> ErrorClass {
    match class {
        FailureClass::Timeout => ErrorClass::Timeout,
        _ => ErrorClass::Database,
    }
}
