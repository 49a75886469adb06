//! The execution-repair state machine.
//!
//! ```text
//! Idle -> Attempting -> Succeeded
//!              |
//!              +-> Retrying -> Attempting -> ...
//!              |
//!              +-> Exhausted
//! ```
//!
//! Each attempt runs a statement that passed the security validator on its
//! own. Attempts never exceed the configured ceiling. Timeouts and failures
//! that are not repairable end the session without reformulating.

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::backend::{RowSet, SqlBackend};
use super::classify::{classify, ClassifiedError, FailureClass};
use super::error::{BackendError, RepairError};
use super::reformulate::Reformulator;
use crate::security::{SecurityValidator, ValidatedStatement};

/// Attempt ceiling used when none is configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
/// Per-attempt timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairConfig {
    /// Total attempts allowed, including the first. At least 1.
    pub max_attempts: u32,
    /// Bound on each database call.
    pub timeout: Duration,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RepairConfig {
    pub fn new(max_attempts: u32, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairState {
    Idle,
    Attempting,
    Retrying,
    Succeeded,
    Exhausted,
}

impl RepairState {
    pub fn is_final(&self) -> bool {
        matches!(self, RepairState::Succeeded | RepairState::Exhausted)
    }

    pub fn can_transition_to(&self, next: RepairState) -> bool {
        use RepairState::*;
        matches!(
            (self, next),
            (Idle, Attempting)
                | (Attempting, Succeeded)
                | (Attempting, Retrying)
                | (Attempting, Exhausted)
                | (Retrying, Attempting)
                | (Retrying, Exhausted)
        )
    }
}

impl fmt::Display for RepairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepairState::Idle => "idle",
            RepairState::Attempting => "attempting",
            RepairState::Retrying => "retrying",
            RepairState::Succeeded => "succeeded",
            RepairState::Exhausted => "exhausted",
        };
        f.write_str(s)
    }
}

/// One database call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt {
    /// 1-based attempt number.
    pub number: u32,
    pub sql: String,
    /// SHA-256 of the statement text.
    pub fingerprint: String,
    /// Whether the statement's limit was clamped by the validator.
    pub clamped: bool,
    /// Wall-clock time of the database call, including a timed-out wait.
    pub elapsed_ms: u64,
    pub failure: Option<ClassifiedError>,
}

/// Record of one request's attempts, ending in `Succeeded` or `Exhausted`.
#[derive(Debug, Clone)]
pub struct RepairSession {
    state: RepairState,
    history: Vec<RepairState>,
    attempts: Vec<Attempt>,
    rows: Option<RowSet>,
    error: Option<RepairError>,
    last_statement: Option<ValidatedStatement>,
}

impl RepairSession {
    fn new() -> Self {
        Self {
            state: RepairState::Idle,
            history: vec![RepairState::Idle],
            attempts: vec![],
            rows: None,
            error: None,
            last_statement: None,
        }
    }

    fn transition(&mut self, next: RepairState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid repair transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
        self.history.push(next);
    }

    fn exhaust(mut self, error: RepairError) -> Self {
        tracing::warn!(attempts = self.attempts.len(), error = %error, "repair session exhausted");
        self.error = Some(error);
        self.transition(RepairState::Exhausted);
        self
    }

    pub fn state(&self) -> RepairState {
        self.state
    }

    /// Every state visited, starting with `Idle`.
    pub fn history(&self) -> &[RepairState] {
        &self.history
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn rows(&self) -> Option<&RowSet> {
        self.rows.as_ref()
    }

    pub fn error(&self) -> Option<&RepairError> {
        self.error.as_ref()
    }

    /// The statement of the last attempt.
    pub fn last_statement(&self) -> Option<&ValidatedStatement> {
        self.last_statement.as_ref()
    }

    pub fn into_result(self) -> Result<RowSet, RepairError> {
        match (self.rows, self.error) {
            (Some(rows), _) => Ok(rows),
            (None, Some(err)) => Err(err),
            (None, None) => Ok(RowSet::default()),
        }
    }
}

/// Runs validated statements with a bounded retry budget.
pub struct RepairLoop<'a> {
    backend: &'a dyn SqlBackend,
    validator: &'a SecurityValidator<'a>,
    reformulator: &'a dyn Reformulator,
    config: RepairConfig,
}

impl<'a> RepairLoop<'a> {
    pub fn new(
        backend: &'a dyn SqlBackend,
        validator: &'a SecurityValidator<'a>,
        reformulator: &'a dyn Reformulator,
    ) -> Self {
        Self {
            backend,
            validator,
            reformulator,
            config: RepairConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RepairConfig) -> Self {
        self.config = RepairConfig::new(config.max_attempts, config.timeout);
        self
    }

    pub async fn run(&self, statement: ValidatedStatement) -> RepairSession {
        let mut session = RepairSession::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut current = statement;
        let dialect = self.backend.dialect();

        loop {
            session.transition(RepairState::Attempting);
            let number = session.attempts.len() as u32 + 1;
            let sql = current.statement().to_sql(dialect);
            let fp = fingerprint(&sql);
            seen.insert(fp.clone());

            tracing::info!(attempt = number, max = self.config.max_attempts, "executing statement");
            let started = Instant::now();
            let outcome = self.execute(&sql).await;
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            session.attempts.push(Attempt {
                number,
                sql,
                fingerprint: fp,
                clamped: current.was_clamped(),
                elapsed_ms,
                failure: outcome.as_ref().err().cloned(),
            });
            session.last_statement = Some(current.clone());

            let failure = match outcome {
                Ok(rows) => {
                    tracing::info!(
                        attempt = number,
                        rows = rows.len(),
                        elapsed_ms,
                        "statement succeeded"
                    );
                    session.rows = Some(rows);
                    session.transition(RepairState::Succeeded);
                    return session;
                }
                Err(failure) => failure,
            };

            tracing::warn!(
                attempt = number,
                class = %failure.class,
                message = %failure.message,
                "statement failed"
            );

            if failure.class == FailureClass::Timeout {
                return session.exhaust(RepairError::Timeout(self.config.timeout));
            }
            let db_error = || RepairError::Database {
                class: failure.class,
                code: failure.code.clone(),
                message: failure.message.clone(),
            };
            if !failure.class.is_repairable() || number >= self.config.max_attempts {
                return session.exhaust(db_error());
            }

            session.transition(RepairState::Retrying);
            let Some(revised) = self
                .reformulator
                .reformulate(current.statement(), &failure)
                .await
            else {
                return session.exhaust(db_error());
            };

            let revised = match self.validator.validate(&revised) {
                Ok(validated) => validated,
                Err(violation) => return session.exhaust(RepairError::Policy(violation)),
            };

            // Clamping can turn a revision back into a statement already run.
            if seen.contains(&fingerprint(&revised.statement().to_sql(dialect))) {
                tracing::debug!("reformulation repeated an earlier statement");
                return session.exhaust(db_error());
            }
            current = revised;
        }
    }

    /// One bounded database call. Elapsed timeouts are reported as
    /// timeout-class failures.
    async fn execute(&self, sql: &str) -> Result<RowSet, ClassifiedError> {
        match tokio::time::timeout(self.config.timeout, self.backend.execute(sql)).await {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(err)) => Err(classify(&err)),
            Err(_) => Err(classify(&BackendError::new(
                "TIMEOUT",
                format!("statement timed out after {:?}", self.config.timeout),
            ))),
        }
    }
}

/// Hex SHA-256 of a statement's text.
pub fn fingerprint(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    format!("{:x}", hasher.finalize())
}
