//! Catalog errors.

use thiserror::Error;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised while loading or reading the catalog.
///
/// Everything except [`CatalogError::NotFound`] is structural: the catalog
/// definition itself is malformed and nothing downstream may run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("entity not found: {0}")]
    NotFound(String),

    #[error("malformed catalog definition: {0}")]
    Definition(String),

    #[error("duplicate entity id: {0}")]
    DuplicateEntity(String),

    #[error("entity {entity} declares field {field} more than once")]
    DuplicateField { entity: String, field: String },

    #[error("entity {entity} joins to undeclared entity {target}")]
    UndeclaredJoinTarget { entity: String, target: String },

    #[error("join {entity} -> {target} has {local} local and {remote} remote key columns")]
    JoinKeyMismatch {
        entity: String,
        target: String,
        local: usize,
        remote: usize,
    },

    #[error("join {entity} -> {target} has no key columns")]
    EmptyJoinKeys { entity: String, target: String },
}

impl CatalogError {
    /// Is this a defect in the catalog definition (as opposed to a lookup miss)?
    pub fn is_structural(&self) -> bool {
        !matches!(self, CatalogError::NotFound(_))
    }
}
