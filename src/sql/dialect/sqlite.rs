//! SQLite SQL dialect.
//!
//! SQLite specifics:
//! - ANSI identifier quoting (`"`)
//! - No boolean type; booleans are stored as 1/0
//! - Dates are stored as ISO text, so date literals are plain strings
//! - No NULLS FIRST/LAST before 3.30, so ordering omits it

use super::helpers;
use super::SqlDialect;

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn format_date_literal(&self, date: &str) -> String {
        self.quote_string(date)
    }

    fn supports_nulls_ordering(&self) -> bool {
        false
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_sqlite(name)
    }
}
