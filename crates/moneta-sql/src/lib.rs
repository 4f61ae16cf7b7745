//! Dialect-agnostic SQL statement builder.
//!
//! Statements are assembled from composable expression objects and always
//! render to parameterized text: bound values never appear as literals in
//! the query string, they flow through the [`KeyManager`] as `:name`
//! parameters.
//!
//! # Layers
//!
//! - [`keys`]: collision-free parameter naming and parameter merging.
//! - [`expr`]: atomic SQL fragments (columns, values, comparisons, boolean
//!   combinators, BETWEEN).
//! - [`clause`]: FROM (with joins), WHERE, GROUP BY, HAVING, VALUES,
//!   assignments, and column definitions.
//! - [`statement`]: SELECT, INSERT, UPDATE, CREATE TABLE, CREATE VIEW, and
//!   verbatim scripts, each producing a final `{query, params}` pair.
//!
//! Builders are dialect-generic: the [`Dialect`](moneta_core::Dialect)
//! strategy chosen for the active backend is threaded through the [`Sql`]
//! entry point, so identical builder code produces SQLite-, MySQL-, or
//! PostgreSQL-flavored output.

pub mod clause;
pub mod expr;
pub mod keys;
pub mod statement;

pub use clause::{Assignment, ColumnDef, From, GroupBy, Having, JoinOperator, Values, Where};
pub use expr::{BinaryOp, Expr};
pub use keys::KeyManager;
pub use statement::{
    CreateTable, CreateTableAsSelect, CreateView, Insert, Script, Select, Sql, Statement, Update,
};
