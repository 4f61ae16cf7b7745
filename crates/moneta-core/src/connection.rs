//! Driver contracts: [`Connection`] and [`Backend`].
//!
//! Drivers receive statements as `:name`-parameterized text plus a named
//! value map and convert them to their native positional form immediately
//! before execution. Every operation takes a `&Cx` capability context and
//! returns an [`Outcome`] so cancellation composes through the stack.

use std::collections::BTreeMap;
use std::future::Future;

use asupersync::{Cx, Outcome};

use crate::dialect::Dialect;
use crate::error::Error;
use crate::params::SqlParams;
use crate::row::Row;

/// Result of a non-query statement execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Rows affected by the statement.
    pub rows_affected: u64,
    /// Generated key of the last inserted row, when the engine reports one.
    pub last_insert_id: Option<i64>,
}

/// One logical database connection.
///
/// A connection serves one logical operation at a time; independent
/// connections may run concurrently against the same database.
pub trait Connection: Send + 'static {
    /// Execute a statement that does not produce rows.
    fn execute(
        &mut self,
        cx: &Cx,
        sql: &str,
        params: &SqlParams,
    ) -> impl Future<Output = Outcome<ExecResult, Error>> + Send;

    /// Execute a query and materialize all result rows.
    fn query(
        &mut self,
        cx: &Cx,
        sql: &str,
        params: &SqlParams,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Execute a query expected to produce at most one row.
    fn query_one(
        &mut self,
        cx: &Cx,
        sql: &str,
        params: &SqlParams,
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        async move {
            match self.query(cx, sql, params).await {
                Outcome::Ok(mut rows) => {
                    if rows.is_empty() {
                        Outcome::Ok(None)
                    } else {
                        Outcome::Ok(Some(rows.remove(0)))
                    }
                }
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        }
    }

    /// Begin a transaction.
    fn begin(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Commit the current transaction.
    fn commit(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Roll back the current transaction.
    fn rollback(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Close the physical connection.
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;
}

/// A database backend: dialect plus connection factory plus structural
/// introspection.
pub trait Backend: Send + Sync + 'static {
    /// The connection type produced by this backend.
    type Conn: Connection;

    /// The SQL strategy for this backend.
    fn dialect(&self) -> &'static dyn Dialect;

    /// Open a fresh (or pooled) connection.
    fn connect(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Conn, Error>> + Send;

    /// Live column definitions of a table, keyed by column name, in the
    /// textual form the schema check compares against.
    fn table_info(
        &self,
        cx: &Cx,
        table: &str,
    ) -> impl Future<Output = Outcome<BTreeMap<String, String>, Error>> + Send;

    /// Names of all user tables.
    fn table_list(&self, cx: &Cx) -> impl Future<Output = Outcome<Vec<String>, Error>> + Send;
}
