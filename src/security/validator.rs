//! Ordered, short-circuiting policy checks.

use super::error::PolicyViolation;
use super::policy::SecurityPolicy;
use crate::sql::SqlStatement;

/// A statement that passed every policy check.
///
/// Constructed only by [`SecurityValidator::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedStatement {
    statement: SqlStatement,
    clamped: bool,
}

impl ValidatedStatement {
    pub fn statement(&self) -> &SqlStatement {
        &self.statement
    }

    pub fn into_inner(self) -> SqlStatement {
        self.statement
    }

    /// Whether the row limit was lowered to the policy maximum.
    pub fn was_clamped(&self) -> bool {
        self.clamped
    }
}

pub struct SecurityValidator<'a> {
    policy: &'a SecurityPolicy,
}

impl<'a> SecurityValidator<'a> {
    pub fn new(policy: &'a SecurityPolicy) -> Self {
        Self { policy }
    }

    /// Check, in order: statement kind, tables, columns, functions, row
    /// limit.
    ///
    /// The first failing check is reported. The kind check reads the
    /// statement's structural tag, never its text.
    pub fn validate(&self, statement: &SqlStatement) -> Result<ValidatedStatement, PolicyViolation> {
        self.check(statement).inspect_err(|violation| {
            tracing::warn!(
                kind = %statement.kind(),
                violation = %violation,
                "statement rejected by security policy"
            );
        })
    }

    fn check(&self, statement: &SqlStatement) -> Result<ValidatedStatement, PolicyViolation> {
        let kind = statement.kind();
        if !kind.is_read_only() {
            return Err(PolicyViolation::StatementKind(kind));
        }

        for table in statement.referenced_tables() {
            if !self.policy.table_allowed(&table) {
                return Err(PolicyViolation::TableNotAllowed(table));
            }
        }

        for col in statement.referenced_columns() {
            if !self.policy.column_allowed(&col.table, &col.column) {
                return Err(PolicyViolation::ColumnNotAllowed {
                    table: col.table,
                    column: col.column,
                });
            }
        }

        for name in statement.referenced_functions() {
            if !self.policy.function_allowed(&name) {
                return Err(PolicyViolation::FunctionNotAllowed(name));
            }
        }

        let max = self.policy.max_rows;
        match statement.limit() {
            Some(limit) if limit <= max => Ok(ValidatedStatement {
                statement: statement.clone(),
                clamped: false,
            }),
            _ if self.policy.clamp_limit => {
                tracing::debug!(requested = ?statement.limit(), max, "row limit clamped");
                Ok(ValidatedStatement {
                    statement: statement.with_limit(max),
                    clamped: true,
                })
            }
            Some(requested) => Err(PolicyViolation::RowLimitExceeded { requested, max }),
            None => Err(PolicyViolation::UnboundedRows { max }),
        }
    }
}
