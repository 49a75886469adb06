use thiserror::Error;

use crate::sql::StatementKind;

/// A security rule breach. Always fatal to the statement that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("{0} statements are not permitted; only SELECT is read-only")]
    StatementKind(StatementKind),

    #[error("table '{0}' is not in the allowlist")]
    TableNotAllowed(String),

    #[error("column '{table}.{column}' is not permitted")]
    ColumnNotAllowed { table: String, column: String },

    #[error("function '{0}' is not permitted")]
    FunctionNotAllowed(String),

    #[error("row limit {requested} exceeds the maximum of {max}")]
    RowLimitExceeded { requested: u64, max: u64 },

    #[error("statement has no row limit and the maximum is {max}")]
    UnboundedRows { max: u64 },
}
