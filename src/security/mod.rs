//! Security validation of typed statements.
//!
//! Every statement passes through [`SecurityValidator::validate`] before it
//! can reach a backend. The only way to obtain a [`ValidatedStatement`] is a
//! successful validation, so the executor's signature enforces the gate.

mod error;
mod policy;
mod validator;

pub use error::PolicyViolation;
pub use policy::SecurityPolicy;
pub use validator::{SecurityValidator, ValidatedStatement};
