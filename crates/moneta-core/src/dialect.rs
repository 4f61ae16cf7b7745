//! The per-backend SQL strategy.
//!
//! A [`Dialect`] is selected once per database connection and threaded
//! through the statement builders, so identical builder code produces
//! SQLite-, MySQL-, or PostgreSQL-flavored output without call-site
//! branching.

use std::fmt;

use crate::error::Result;
use crate::flags::ColumnFlags;
use crate::types::{AttrExtra, AttrType};

/// Keys for dialect specific SQL templates used by script statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlTemplate {
    /// List all user tables.
    TableList,
    /// Describe the columns of one table (`:table` parameter).
    TableInfo,
    /// The stored CREATE TABLE text of one table (`:table` parameter).
    TableSql,
    /// List all views.
    ViewList,
    /// Report the server version banner.
    DbVersion,
}

/// Backend-specific SQL vocabulary.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Short dialect name for logs ("sqlite", "mysql", "mariadb", ...).
    fn name(&self) -> &'static str;

    /// Native column type for a semantic attribute type.
    ///
    /// Flag attributes compute their type from the declared member names in
    /// `extra`.
    fn column_type(&self, ty: AttrType, extra: &AttrExtra) -> Result<String>;

    /// Native syntax for a set of constraint flags.
    ///
    /// Foreign keys substitute their target table from `extra`.
    fn constraint_sql(&self, flags: ColumnFlags, extra: &AttrExtra) -> Result<String>;

    /// Structural introspection template, when the backend provides one.
    fn template(&self, template: SqlTemplate) -> Option<&'static str>;

    /// Whether INSERT/UPDATE may carry a RETURNING clause.
    fn supports_returning(&self) -> bool {
        true
    }
}
