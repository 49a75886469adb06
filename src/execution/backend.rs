//! The database boundary.

use async_trait::async_trait;
use serde::Serialize;

use super::error::BackendError;
use crate::sql::Dialect;

/// Name and storage type of a result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMeta {
    pub name: String,
    /// Type reported by the backend, or inferred from the first non-null value.
    pub value_type: Option<String>,
}

/// A column-typed result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowSet {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Anything that executes SQL text and returns rows or a structured error.
///
/// Connection handling is the implementor's concern. Callers bound each
/// call with a timeout, so implementations need not.
#[async_trait]
pub trait SqlBackend: Send + Sync {
    /// Dialect statements must be rendered in for this backend.
    fn dialect(&self) -> Dialect;

    async fn execute(&self, sql: &str) -> Result<RowSet, BackendError>;
}
