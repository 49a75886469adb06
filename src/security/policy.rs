//! Static allow/deny configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{Entity, SemanticCatalog};
use crate::sql::expr::is_builtin_function;

/// Rules constraining which statements may run.
///
/// Table and column names compare case-insensitively. An empty table
/// allowlist permits nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    /// Physical tables a statement may read.
    pub allowed_tables: Vec<String>,
    /// Columns that may never be read, as `table.column`.
    pub denied_columns: Vec<String>,
    /// Per-table column allowlists. Tables without an entry allow every
    /// column not explicitly denied.
    pub allowed_columns: BTreeMap<String, Vec<String>>,
    /// Scalar functions permitted beyond the aggregates and the built-in
    /// scalar set.
    pub allowed_functions: Vec<String>,
    /// Maximum rows a statement may return.
    pub max_rows: u64,
    /// Clamp an excessive or missing limit to `max_rows` instead of rejecting.
    pub clamp_limit: bool,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            allowed_tables: vec![],
            denied_columns: vec![],
            allowed_columns: BTreeMap::new(),
            allowed_functions: vec![],
            max_rows: 1000,
            clamp_limit: true,
        }
    }
}

impl SecurityPolicy {
    /// A policy allowing every table the catalog exposes.
    pub fn for_catalog(catalog: &SemanticCatalog) -> Self {
        Self {
            allowed_tables: catalog.entities().map(Entity::qualified_table).collect(),
            ..Self::default()
        }
    }

    pub fn with_allowed_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn deny_column(mut self, table: &str, column: &str) -> Self {
        self.denied_columns.push(format!("{table}.{column}"));
        self
    }

    pub fn allow_columns<I, S>(mut self, table: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_columns
            .insert(table.to_string(), columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn allow_functions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_functions.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_max_rows(mut self, max_rows: u64, clamp: bool) -> Self {
        self.max_rows = max_rows;
        self.clamp_limit = clamp;
        self
    }

    /// Whether a table may be read. A schema-qualified reference
    /// (`schema.table`) is only allowed when the allowlist names it with the
    /// same schema; a bare entry covers only unqualified references.
    pub fn table_allowed(&self, table: &str) -> bool {
        self.allowed_tables
            .iter()
            .any(|t| t.eq_ignore_ascii_case(table))
    }

    /// Whether a column may be read. `*` is only allowed on tables with
    /// no column rules at all.
    ///
    /// Column rules naming a bare table apply to that table in every schema.
    pub fn column_allowed(&self, table: &str, column: &str) -> bool {
        let allowlist = self
            .allowed_columns
            .iter()
            .find(|(t, _)| rule_covers(t, table))
            .map(|(_, cols)| cols);

        if column == "*" {
            return allowlist.is_none() && !self.has_denied_columns(table);
        }

        if self.denied_columns.iter().any(|d| {
            d.rsplit_once('.')
                .is_some_and(|(t, c)| rule_covers(t, table) && c.eq_ignore_ascii_case(column))
        }) {
            return false;
        }

        allowlist.map_or(true, |cols| {
            cols.iter().any(|c| c.eq_ignore_ascii_case(column))
        })
    }

    pub fn function_allowed(&self, name: &str) -> bool {
        is_builtin_function(name)
            || self
                .allowed_functions
                .iter()
                .any(|f| f.eq_ignore_ascii_case(name))
    }

    fn has_denied_columns(&self, table: &str) -> bool {
        self.denied_columns.iter().any(|d| {
            d.rsplit_once('.')
                .is_some_and(|(t, _)| rule_covers(t, table))
        })
    }
}

/// Does a column rule's table name cover `table`?
fn rule_covers(rule: &str, table: &str) -> bool {
    if rule.eq_ignore_ascii_case(table) {
        return true;
    }
    !rule.contains('.')
        && table
            .rsplit_once('.')
            .is_some_and(|(_, bare)| bare.eq_ignore_ascii_case(rule))
}
