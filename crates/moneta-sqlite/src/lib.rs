//! SQLite driver.
//!
//! Each logical connection opens a direct file handle and enforces
//! foreign-key checking. Named parameters are converted to positional form
//! immediately before execution; structured values are serialized to
//! compact JSON text because SQLite binds JSON columns as text.

pub mod dialect;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use asupersync::{Cx, Outcome};
use moneta_core::connection::{Backend, Connection, ExecResult};
use moneta_core::error::{Error, Result};
use moneta_core::params::{SqlParams, bind_positional};
use moneta_core::row::Row;
use moneta_core::value::Value;
use moneta_core::{Dialect, SqlTemplate};
use regex::Regex;

pub use dialect::{SQLITE_DIALECT, SqliteDialect};

/// Extracts the column list of a stored `CREATE TABLE` statement.
static CREATE_TABLE_COLUMNS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]*)\)").expect("valid create-table regex"));

/// SQLite backend: dialect plus per-operation direct connections.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    path: PathBuf,
}

impl SqliteBackend {
    /// Backend for the database file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The configured database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        let Some(parent) = self.path.parent() else {
            return Ok(());
        };
        if parent.as_os_str().is_empty() {
            return Ok(());
        }
        if !parent.exists() {
            tracing::info!(dir = %parent.display(), "creating missing directory for SQLite DB");
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::configuration(format!("cannot create '{}': {e}", parent.display())))?;
        } else if !parent.is_dir() {
            return Err(Error::configuration(format!(
                "path containing SQLite DB exists and is not a directory: {}",
                parent.display()
            )));
        }
        Ok(())
    }
}

impl Backend for SqliteBackend {
    type Conn = SqliteConnection;

    fn dialect(&self) -> &'static dyn Dialect {
        &SQLITE_DIALECT
    }

    fn connect(
        &self,
        _cx: &Cx,
    ) -> impl std::future::Future<Output = Outcome<Self::Conn, Error>> + Send {
        let result = self
            .ensure_parent_dir()
            .and_then(|()| SqliteConnection::open(&self.path));
        async move {
            match result {
                Ok(conn) => Outcome::Ok(conn),
                Err(e) => Outcome::Err(e),
            }
        }
    }

    fn table_info(
        &self,
        cx: &Cx,
        table: &str,
    ) -> impl std::future::Future<Output = Outcome<BTreeMap<String, String>, Error>> + Send {
        let template = SQLITE_DIALECT.template(SqlTemplate::TableSql);
        let path = self.path.clone();
        let table = table.to_string();
        let ensure = self.ensure_parent_dir();
        async move {
            let query = match template {
                Some(q) => q,
                None => return Outcome::Err(Error::operational("no TABLESQL template")),
            };
            let mut conn = match ensure.and_then(|()| SqliteConnection::open(&path)) {
                Ok(conn) => conn,
                Err(e) => return Outcome::Err(e),
            };
            let params: SqlParams =
                std::iter::once(("table".to_string(), Value::Text(table.clone()))).collect();
            let row = match conn.query_one(cx, query, &params).await {
                Outcome::Ok(Some(row)) => row,
                Outcome::Ok(None) => {
                    return Outcome::Err(Error::operational(format!(
                        "table '{table}' not found in sqlite_master"
                    )));
                }
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            let sql_text = match row.get_named::<String>("sql") {
                Ok(text) => text,
                Err(e) => return Outcome::Err(e),
            };
            Outcome::Ok(parse_create_table_columns(&sql_text))
        }
    }

    fn table_list(
        &self,
        cx: &Cx,
    ) -> impl std::future::Future<Output = Outcome<Vec<String>, Error>> + Send {
        let template = SQLITE_DIALECT.template(SqlTemplate::TableList);
        let path = self.path.clone();
        let ensure = self.ensure_parent_dir();
        async move {
            let query = match template {
                Some(q) => q,
                None => return Outcome::Err(Error::operational("no TABLELIST template")),
            };
            let mut conn = match ensure.and_then(|()| SqliteConnection::open(&path)) {
                Ok(conn) => conn,
                Err(e) => return Outcome::Err(e),
            };
            match conn.query(cx, query, &SqlParams::new()).await {
                Outcome::Ok(rows) => {
                    let mut names = Vec::with_capacity(rows.len());
                    for row in &rows {
                        match row.get_named::<String>("table_name") {
                            Ok(name) => names.push(name),
                            Err(e) => return Outcome::Err(e),
                        }
                    }
                    Outcome::Ok(names)
                }
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        }
    }
}

/// Split the stored CREATE TABLE text into per-column definition strings.
fn parse_create_table_columns(sql: &str) -> BTreeMap<String, String> {
    let mut info = BTreeMap::new();
    if let Some(caps) = CREATE_TABLE_COLUMNS_RE.captures(sql) {
        for part in caps[1].split(',') {
            let definition = part.split_whitespace().collect::<Vec<_>>().join(" ");
            if let Some(name) = definition.split(' ').next() {
                if !name.is_empty() {
                    info.insert(name.to_string(), definition.clone());
                }
            }
        }
    }
    info
}

/// One direct SQLite connection.
#[derive(Debug)]
pub struct SqliteConnection {
    conn: Option<rusqlite::Connection>,
}

impl SqliteConnection {
    /// Open the database file, enforcing foreign-key checking.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| Error::operational(format!("{e} during connection open")))?;
        Self::configure(conn)
    }

    /// Open an in-memory database (tests and scratch work).
    pub fn open_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| Error::operational(format!("{e} during connection open")))?;
        Self::configure(conn)
    }

    fn configure(conn: rusqlite::Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON")
            .map_err(|e| Error::operational(format!("{e} during connection setup")))?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut rusqlite::Connection> {
        self.conn
            .as_mut()
            .ok_or_else(|| Error::operational("connection is closed"))
    }

    fn run_execute(&mut self, sql: &str, params: &SqlParams) -> Result<ExecResult> {
        let (query, values) = bind_positional(sql, params, true)?;
        let native: Vec<rusqlite::types::Value> = values.iter().map(to_native).collect();
        let conn = self.conn()?;

        let head = leading_keyword(&query);
        if head == "SELECT" {
            // The native driver reports no row count for reads issued
            // through the execute path; recompute it with a sub-query.
            let count_sql = format!("SELECT COUNT(*) AS rowcount FROM ({query})");
            let count: i64 = conn
                .query_row(
                    &count_sql,
                    rusqlite::params_from_iter(native.iter()),
                    |row| row.get(0),
                )
                .map_err(|e| Error::operational(format!("{e} during SQL execution")))?;
            return Ok(ExecResult {
                rows_affected: count.max(0) as u64,
                last_insert_id: None,
            });
        }

        let affected = conn
            .execute(&query, rusqlite::params_from_iter(native.iter()))
            .map_err(|e| Error::operational(format!("{e} during SQL execution")))?;
        let last_insert_id = if head == "INSERT" {
            Some(conn.last_insert_rowid())
        } else {
            None
        };
        Ok(ExecResult {
            rows_affected: affected as u64,
            last_insert_id,
        })
    }

    fn run_query(&mut self, sql: &str, params: &SqlParams) -> Result<Vec<Row>> {
        let (query, values) = bind_positional(sql, params, true)?;
        let native: Vec<rusqlite::types::Value> = values.iter().map(to_native).collect();
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&query)
            .map_err(|e| Error::operational(format!("{e} during SQL execution")))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| (*c).to_string()).collect();
        let mut rows = stmt
            .query(rusqlite::params_from_iter(native.iter()))
            .map_err(|e| Error::operational(format!("{e} during SQL execution")))?;

        let mut result = Vec::new();
        loop {
            let row = rows
                .next()
                .map_err(|e| Error::operational(format!("{e} during row fetch")))?;
            let Some(row) = row else { break };
            let mut values = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                let value = row
                    .get_ref(idx)
                    .map_err(|e| Error::operational(format!("{e} during row fetch")))?;
                values.push(from_native(value)?);
            }
            result.push(Row::new(columns.clone(), values));
        }
        Ok(result)
    }

    fn run_batch(&mut self, sql: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(sql)
            .map_err(|e| Error::operational(format!("{e} during SQL execution")))
    }

    fn in_transaction(&mut self) -> Result<bool> {
        Ok(!self.conn()?.is_autocommit())
    }
}

fn leading_keyword(sql: &str) -> String {
    sql.trim_start()
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_uppercase()
}

fn to_native(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(i64::from(*b)),
        Value::Int(i) => rusqlite::types::Value::Integer(*i),
        Value::Float(f) => rusqlite::types::Value::Real(*f),
        Value::Text(s) | Value::Date(s) | Value::Timestamp(s) => {
            rusqlite::types::Value::Text(s.clone())
        }
        Value::Json(j) => rusqlite::types::Value::Text(
            serde_json::to_string(j).unwrap_or_else(|_| "null".to_string()),
        ),
    }
}

fn from_native(value: rusqlite::types::ValueRef<'_>) -> Result<Value> {
    match value {
        rusqlite::types::ValueRef::Null => Ok(Value::Null),
        rusqlite::types::ValueRef::Integer(i) => Ok(Value::Int(i)),
        rusqlite::types::ValueRef::Real(f) => Ok(Value::Float(f)),
        rusqlite::types::ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| Error::operational(format!("{e} during row fetch")))?;
            Ok(Value::Text(text.to_string()))
        }
        rusqlite::types::ValueRef::Blob(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            Ok(Value::Text(text))
        }
    }
}

impl Connection for SqliteConnection {
    fn execute(
        &mut self,
        _cx: &Cx,
        sql: &str,
        params: &SqlParams,
    ) -> impl std::future::Future<Output = Outcome<ExecResult, Error>> + Send {
        let result = self.run_execute(sql, params);
        async move {
            match result {
                Ok(r) => Outcome::Ok(r),
                Err(e) => Outcome::Err(e),
            }
        }
    }

    fn query(
        &mut self,
        _cx: &Cx,
        sql: &str,
        params: &SqlParams,
    ) -> impl std::future::Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = self.run_query(sql, params);
        async move {
            match result {
                Ok(r) => Outcome::Ok(r),
                Err(e) => Outcome::Err(e),
            }
        }
    }

    fn begin(&mut self, _cx: &Cx) -> impl std::future::Future<Output = Outcome<(), Error>> + Send {
        let result = self.run_batch("BEGIN");
        async move {
            match result {
                Ok(()) => Outcome::Ok(()),
                Err(e) => Outcome::Err(e),
            }
        }
    }

    fn commit(&mut self, _cx: &Cx) -> impl std::future::Future<Output = Outcome<(), Error>> + Send {
        // SQLite auto-commits outside explicit transactions; COMMIT there
        // would itself be an error.
        let result = match self.in_transaction() {
            Ok(true) => self.run_batch("COMMIT"),
            Ok(false) => Ok(()),
            Err(e) => Err(e),
        };
        async move {
            match result {
                Ok(()) => Outcome::Ok(()),
                Err(e) => Outcome::Err(e),
            }
        }
    }

    fn rollback(
        &mut self,
        _cx: &Cx,
    ) -> impl std::future::Future<Output = Outcome<(), Error>> + Send {
        let result = match self.in_transaction() {
            Ok(true) => self.run_batch("ROLLBACK"),
            Ok(false) => Ok(()),
            Err(e) => Err(e),
        };
        async move {
            match result {
                Ok(()) => Outcome::Ok(()),
                Err(e) => Outcome::Err(e),
            }
        }
    }

    fn close(&mut self, _cx: &Cx) -> impl std::future::Future<Output = Outcome<(), Error>> + Send {
        let result = match self.conn.take() {
            Some(conn) => conn
                .close()
                .map_err(|(_, e)| Error::operational(format!("{e} during connection close"))),
            None => Ok(()),
        };
        async move {
            match result {
                Ok(()) => Outcome::Ok(()),
                Err(e) => Outcome::Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asupersync::runtime::RuntimeBuilder;

    fn run<T>(f: impl std::future::Future<Output = T>) -> T {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        rt.block_on(f)
    }

    fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
        match outcome {
            Outcome::Ok(v) => v,
            Outcome::Err(e) => panic!("unexpected error: {e}"),
            Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
            Outcome::Panicked(p) => panic!("panicked: {p:?}"),
        }
    }

    fn params(pairs: &[(&str, Value)]) -> SqlParams {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_execute_insert_and_query_roundtrip() {
        let cx = Cx::for_testing();
        run(async {
            let mut conn = SqliteConnection::open_memory().expect("open sqlite memory db");
            unwrap_outcome(
                conn.execute(
                    &cx,
                    "CREATE TABLE accounts (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)",
                    &SqlParams::new(),
                )
                .await,
            );
            let result = unwrap_outcome(
                conn.execute(
                    &cx,
                    "INSERT INTO accounts (name) VALUES (:name)",
                    &params(&[("name", Value::Text("checking".into()))]),
                )
                .await,
            );
            assert_eq!(result.rows_affected, 1);
            assert_eq!(result.last_insert_id, Some(1));

            let rows = unwrap_outcome(
                conn.query(
                    &cx,
                    "SELECT id, name FROM accounts WHERE name = :name",
                    &params(&[("name", Value::Text("checking".into()))]),
                )
                .await,
            );
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].get_named::<i64>("id").unwrap(), 1);
            assert_eq!(rows[0].get_named::<String>("name").unwrap(), "checking");
        });
    }

    #[test]
    fn test_select_through_execute_recomputes_rowcount() {
        let cx = Cx::for_testing();
        run(async {
            let mut conn = SqliteConnection::open_memory().expect("open sqlite memory db");
            unwrap_outcome(
                conn.execute(&cx, "CREATE TABLE t (v INTEGER)", &SqlParams::new())
                    .await,
            );
            for v in 0..3 {
                unwrap_outcome(
                    conn.execute(
                        &cx,
                        "INSERT INTO t (v) VALUES (:v)",
                        &params(&[("v", Value::Int(v))]),
                    )
                    .await,
                );
            }
            let result = unwrap_outcome(
                conn.execute(&cx, "SELECT v FROM t", &SqlParams::new()).await,
            );
            assert_eq!(result.rows_affected, 3);
        });
    }

    #[test]
    fn test_native_error_is_wrapped_operational() {
        let cx = Cx::for_testing();
        run(async {
            let mut conn = SqliteConnection::open_memory().expect("open sqlite memory db");
            let outcome = conn
                .execute(&cx, "INSERT INTO missing (v) VALUES (1)", &SqlParams::new())
                .await;
            match outcome {
                Outcome::Err(Error::Operational(msg)) => {
                    assert!(msg.contains("during SQL execution"));
                }
                _ => panic!("expected an operational error"),
            }
        });
    }

    #[test]
    fn test_json_params_bind_as_text() {
        let cx = Cx::for_testing();
        run(async {
            let mut conn = SqliteConnection::open_memory().expect("open sqlite memory db");
            unwrap_outcome(
                conn.execute(&cx, "CREATE TABLE t (doc JSON)", &SqlParams::new())
                    .await,
            );
            unwrap_outcome(
                conn.execute(
                    &cx,
                    "INSERT INTO t (doc) VALUES (:doc)",
                    &params(&[("doc", Value::Json(serde_json::json!({"a": 1})))]),
                )
                .await,
            );
            let rows = unwrap_outcome(conn.query(&cx, "SELECT doc FROM t", &SqlParams::new()).await);
            assert_eq!(
                rows[0].get_named::<String>("doc").unwrap(),
                r#"{"a":1}"#
            );
        });
    }

    #[test]
    fn test_transaction_rollback_discards_changes() {
        let cx = Cx::for_testing();
        run(async {
            let mut conn = SqliteConnection::open_memory().expect("open sqlite memory db");
            unwrap_outcome(
                conn.execute(&cx, "CREATE TABLE t (v INTEGER)", &SqlParams::new())
                    .await,
            );
            unwrap_outcome(conn.begin(&cx).await);
            unwrap_outcome(
                conn.execute(&cx, "INSERT INTO t (v) VALUES (1)", &SqlParams::new())
                    .await,
            );
            unwrap_outcome(conn.rollback(&cx).await);
            let rows = unwrap_outcome(conn.query(&cx, "SELECT v FROM t", &SqlParams::new()).await);
            assert!(rows.is_empty());
        });
    }

    #[test]
    fn test_parse_create_table_columns() {
        let info = parse_create_table_columns(
            "CREATE TABLE accounts (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)",
        );
        assert_eq!(
            info.get("id").map(String::as_str),
            Some("id INTEGER PRIMARY KEY AUTOINCREMENT")
        );
        assert_eq!(
            info.get("name").map(String::as_str),
            Some("name TEXT NOT NULL")
        );
    }

    #[test]
    fn test_execute_after_close_fails() {
        let cx = Cx::for_testing();
        run(async {
            let mut conn = SqliteConnection::open_memory().expect("open sqlite memory db");
            unwrap_outcome(conn.close(&cx).await);
            let outcome = conn.execute(&cx, "SELECT 1", &SqlParams::new()).await;
            assert!(matches!(outcome, Outcome::Err(Error::Operational(_))));
        });
    }
}
