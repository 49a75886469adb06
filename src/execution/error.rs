use std::time::Duration;

use thiserror::Error;

use super::classify::FailureClass;
use crate::security::PolicyViolation;

/// A structured error returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{code}] {message}")]
pub struct BackendError {
    pub code: String,
    pub message: String,
}

impl BackendError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Why a repair session ended without rows.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepairError {
    #[error("{class} error from database: {message}")]
    Database {
        class: FailureClass,
        code: String,
        message: String,
    },

    #[error("statement did not complete within {0:?}")]
    Timeout(Duration),

    #[error("reformulated statement rejected: {0}")]
    Policy(#[from] PolicyViolation),
}

impl RepairError {
    pub fn class(&self) -> Option<FailureClass> {
        match self {
            RepairError::Database { class, .. } => Some(*class),
            RepairError::Timeout(_) => Some(FailureClass::Timeout),
            RepairError::Policy(_) => None,
        }
    }
}
