//! MySQL/MariaDB driver.
//!
//! Connections come from a bounded pool (1–50, recycled after an hour of
//! use). On the first connection the live server's version banner is
//! asserted against the configured flavor; a mismatch is a configuration
//! error. Named parameters are converted to the client's positional form
//! immediately before execution, with structured values dumped to JSON
//! text.

pub mod config;
pub mod dialect;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use asupersync::{Cx, Outcome};
use moneta_core::connection::{Backend, Connection, ExecResult};
use moneta_core::error::{Error, Result};
use moneta_core::params::{SqlParams, bind_positional};
use moneta_core::row::Row;
use moneta_core::value::Value;
use moneta_core::{Dialect, SqlTemplate};
use mysql::prelude::Queryable;

pub use config::{MySqlConfig, POOL_MAX_BOUND, POOL_MIN_BOUND, POOL_RECYCLE, TlsConfig};
pub use dialect::{MARIADB_DIALECT, MYSQL_DIALECT, MySqlDialect, check_version_banner, dialect_for};

/// MySQL/MariaDB backend over a bounded connection pool.
pub struct MySqlBackend {
    config: MySqlConfig,
    pool: mysql::Pool,
    version_checked: AtomicBool,
}

impl MySqlBackend {
    /// Validate the configuration and set up the bounded pool.
    ///
    /// The pool establishes its minimum connections; the server's version
    /// banner is asserted against the configured flavor on the first
    /// checkout.
    pub fn connect(config: MySqlConfig) -> Result<Self> {
        config.validate()?;
        let (min, max) = config.effective_pool_bounds();
        let constraints = mysql::PoolConstraints::new(min, max)
            .ok_or_else(|| Error::configuration("invalid pool bounds"))?;
        let opts = mysql::OptsBuilder::new()
            .ip_or_hostname(Some(config.host.clone()))
            .tcp_port(config.port)
            .db_name(Some(config.db.clone()))
            .user(Some(config.user.clone()))
            .pass(config.password.clone())
            .pool_opts(mysql::PoolOpts::new().with_constraints(constraints));
        let pool = mysql::Pool::new(opts)
            .map_err(|e| Error::configuration(format!("{e} during pool setup")))?;
        Ok(Self {
            config,
            pool,
            version_checked: AtomicBool::new(false),
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &MySqlConfig {
        &self.config
    }

    fn checkout(&self) -> Result<MySqlConnection> {
        let conn = self
            .pool
            .get_conn()
            .map_err(|e| Error::operational(format!("{e} during connection checkout")))?;
        let mut conn = MySqlConnection {
            pool: self.pool.clone(),
            conn: Some(conn),
            opened: Instant::now(),
        };
        if !self.version_checked.load(Ordering::Acquire) {
            let banner = conn.fetch_version_banner()?;
            tracing::info!(version = %banner, "connected to DB");
            check_version_banner(&banner, self.config.flavor)?;
            self.version_checked.store(true, Ordering::Release);
        }
        Ok(conn)
    }
}

impl Backend for MySqlBackend {
    type Conn = MySqlConnection;

    fn dialect(&self) -> &'static dyn Dialect {
        dialect_for(self.config.flavor)
    }

    fn connect(
        &self,
        _cx: &Cx,
    ) -> impl std::future::Future<Output = Outcome<Self::Conn, Error>> + Send {
        let result = self.checkout();
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
        let result = self.checkout();
        let template = self.dialect().template(SqlTemplate::TableInfo);
        let table = table.to_string();
        async move {
            let query = match template {
                Some(q) => q,
                None => return Outcome::Err(Error::operational("no TABLEINFO template")),
            };
            let mut conn = match result {
                Ok(conn) => conn,
                Err(e) => return Outcome::Err(e),
            };
            let params: SqlParams =
                std::iter::once(("table".to_string(), Value::Text(table))).collect();
            match conn.query(cx, query, &params).await {
                Outcome::Ok(rows) => {
                    let mut info = BTreeMap::new();
                    for row in &rows {
                        let name = match row.get_named::<String>("name") {
                            Ok(name) => name,
                            Err(e) => return Outcome::Err(e),
                        };
                        let definition = match row.get_named::<String>("column_info") {
                            Ok(definition) => definition,
                            Err(e) => return Outcome::Err(e),
                        };
                        info.insert(name, definition);
                    }
                    Outcome::Ok(info)
                }
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        }
    }

    fn table_list(
        &self,
        cx: &Cx,
    ) -> impl std::future::Future<Output = Outcome<Vec<String>, Error>> + Send {
        let result = self.checkout();
        let template = self.dialect().template(SqlTemplate::TableList);
        async move {
            let query = match template {
                Some(q) => q,
                None => return Outcome::Err(Error::operational("no TABLELIST template")),
            };
            let mut conn = match result {
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

/// One pooled MySQL connection.
pub struct MySqlConnection {
    pool: mysql::Pool,
    conn: Option<mysql::PooledConn>,
    opened: Instant,
}

impl MySqlConnection {
    fn conn(&mut self) -> Result<&mut mysql::PooledConn> {
        if self.opened.elapsed() >= POOL_RECYCLE {
            // Recycle: replace a connection that has been in use for over
            // an hour with a fresh checkout.
            tracing::debug!("recycling pooled connection past its TTL");
            let fresh = self
                .pool
                .get_conn()
                .map_err(|e| Error::operational(format!("{e} during connection recycle")))?;
            self.conn = Some(fresh);
            self.opened = Instant::now();
        }
        self.conn
            .as_mut()
            .ok_or_else(|| Error::operational("connection is closed"))
    }

    fn fetch_version_banner(&mut self) -> Result<String> {
        let conn = self.conn()?;
        let banner: Option<String> = conn
            .query_first("SELECT VERSION()")
            .map_err(|e| Error::operational(format!("{e} during version query")))?;
        banner.ok_or_else(|| Error::operational("server reported no version banner"))
    }

    fn run_execute(&mut self, sql: &str, params: &SqlParams) -> Result<ExecResult> {
        let (query, values) = bind_positional(sql, params, true)?;
        let native = to_native_params(&values);
        let conn = self.conn()?;
        let result = conn
            .exec_iter(query, native)
            .map_err(|e| Error::operational(format!("{e} during SQL execution")))?;
        let rows_affected = result.affected_rows();
        let last_insert_id = result.last_insert_id().map(|id| id as i64);
        drop(result);
        Ok(ExecResult {
            rows_affected,
            last_insert_id,
        })
    }

    fn run_query(&mut self, sql: &str, params: &SqlParams) -> Result<Vec<Row>> {
        let (query, values) = bind_positional(sql, params, true)?;
        let native = to_native_params(&values);
        let conn = self.conn()?;
        let result = conn
            .exec_iter(query, native)
            .map_err(|e| Error::operational(format!("{e} during SQL execution")))?;

        let mut rows_out = Vec::new();
        for row in result {
            let row = row.map_err(|e| Error::operational(format!("{e} during row fetch")))?;
            let columns: Vec<String> = row
                .columns_ref()
                .iter()
                .map(|c| c.name_str().into_owned())
                .collect();
            let values: Vec<Value> = row.unwrap().into_iter().map(from_native).collect();
            rows_out.push(Row::new(columns, values));
        }
        Ok(rows_out)
    }

    fn run_simple(&mut self, sql: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.query_drop(sql)
            .map_err(|e| Error::operational(format!("{e} during SQL execution")))
    }
}

fn to_native_params(values: &[Value]) -> mysql::Params {
    if values.is_empty() {
        return mysql::Params::Empty;
    }
    mysql::Params::Positional(values.iter().map(to_native).collect())
}

fn to_native(value: &Value) -> mysql::Value {
    match value {
        Value::Null => mysql::Value::NULL,
        Value::Bool(b) => mysql::Value::Int(i64::from(*b)),
        Value::Int(i) => mysql::Value::Int(*i),
        Value::Float(f) => mysql::Value::Double(*f),
        Value::Text(s) | Value::Date(s) | Value::Timestamp(s) => {
            mysql::Value::Bytes(s.clone().into_bytes())
        }
        Value::Json(j) => mysql::Value::Bytes(
            serde_json::to_string(j)
                .unwrap_or_else(|_| "null".to_string())
                .into_bytes(),
        ),
    }
}

fn from_native(value: mysql::Value) -> Value {
    match value {
        mysql::Value::NULL => Value::Null,
        mysql::Value::Int(i) => Value::Int(i),
        mysql::Value::UInt(u) => Value::Int(u as i64),
        mysql::Value::Float(f) => Value::Float(f64::from(f)),
        mysql::Value::Double(d) => Value::Float(d),
        mysql::Value::Bytes(bytes) => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
        mysql::Value::Date(year, month, day, hour, minute, second, micros) => {
            if hour == 0 && minute == 0 && second == 0 && micros == 0 {
                Value::Date(format!("{year:04}-{month:02}-{day:02}"))
            } else {
                Value::Timestamp(format!(
                    "{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}"
                ))
            }
        }
        mysql::Value::Time(neg, days, hours, minutes, seconds, _micros) => {
            let sign = if neg { "-" } else { "" };
            let total_hours = days * 24 + u32::from(hours);
            Value::Text(format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}"))
        }
    }
}

impl Connection for MySqlConnection {
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
        let result = self.run_simple("BEGIN");
        async move {
            match result {
                Ok(()) => Outcome::Ok(()),
                Err(e) => Outcome::Err(e),
            }
        }
    }

    fn commit(&mut self, _cx: &Cx) -> impl std::future::Future<Output = Outcome<(), Error>> + Send {
        let result = self.run_simple("COMMIT");
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
        let result = self.run_simple("ROLLBACK");
        async move {
            match result {
                Ok(()) => Outcome::Ok(()),
                Err(e) => Outcome::Err(e),
            }
        }
    }

    fn close(&mut self, _cx: &Cx) -> impl std::future::Future<Output = Outcome<(), Error>> + Send {
        // Returning the pooled connection is the close; the pool owns the
        // physical socket lifetime.
        self.conn = None;
        async move { Outcome::Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_native_values() {
        assert_eq!(to_native(&Value::Null), mysql::Value::NULL);
        assert_eq!(to_native(&Value::Int(5)), mysql::Value::Int(5));
        assert_eq!(to_native(&Value::Bool(true)), mysql::Value::Int(1));
        assert_eq!(
            to_native(&Value::Text("x".into())),
            mysql::Value::Bytes(b"x".to_vec())
        );
        assert_eq!(
            to_native(&Value::Json(serde_json::json!([1, 2]))),
            mysql::Value::Bytes(b"[1,2]".to_vec())
        );
    }

    #[test]
    fn test_from_native_values() {
        assert_eq!(from_native(mysql::Value::NULL), Value::Null);
        assert_eq!(from_native(mysql::Value::UInt(7)), Value::Int(7));
        assert_eq!(
            from_native(mysql::Value::Bytes(b"hello".to_vec())),
            Value::Text("hello".to_string())
        );
        assert_eq!(
            from_native(mysql::Value::Date(2026, 8, 6, 0, 0, 0, 0)),
            Value::Date("2026-08-06".to_string())
        );
        assert_eq!(
            from_native(mysql::Value::Date(2026, 8, 6, 13, 5, 9, 0)),
            Value::Timestamp("2026-08-06T13:05:09".to_string())
        );
    }

    #[test]
    fn test_empty_params_map_to_empty() {
        assert!(matches!(to_native_params(&[]), mysql::Params::Empty));
        assert!(matches!(
            to_native_params(&[Value::Int(1)]),
            mysql::Params::Positional(_)
        ));
    }
}
