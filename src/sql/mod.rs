//! SQL generation module.
//!
//! This module provides the typed SQL IR and its multi-dialect renderer:
//!
//! - [`query`] - SELECT query builder
//! - [`expr`] - Expression AST and builder DSL
//! - [`statement`] - [`SqlStatement`] and [`StatementKind`]
//! - [`parse`] - lowering of SQL text into the IR
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod expr;
pub mod parse;
pub mod query;
pub mod statement;
pub mod token;


// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    avg, col, count, count_distinct, count_star, func, lit_bool, lit_date, lit_float, lit_int,
    lit_null, lit_str, max, min, star, sum, table_col, BinaryOperator, Expr, ExprExt, Literal,
    UnaryOperator,
};
pub use parse::{parse_statement, ParseError};
pub use query::{
    Cte, Join, JoinType, NullsOrder, OrderByExpr, Query, SelectExpr, SortDir, TableBinding,
    TableRef,
};
pub use statement::{ColumnRef, SqlStatement, StatementKind};
pub use token::{Token, TokenStream};
