//! PostgreSQL backend stub.
//!
//! Carries the dialect vocabulary so statements can be rendered, but no
//! wire transport: connecting reports the backend as unavailable. The
//! embedding application is expected to degrade its status instead of
//! treating this as a crash.

use std::collections::BTreeMap;

use asupersync::{Cx, Outcome};
use moneta_core::connection::{Backend, Connection, ExecResult};
use moneta_core::error::{Error, Result};
use moneta_core::flags::ColumnFlags;
use moneta_core::params::SqlParams;
use moneta_core::row::Row;
use moneta_core::types::{AttrExtra, AttrType};
use moneta_core::{Dialect, SqlTemplate};

/// The PostgreSQL dialect strategy.
#[derive(Debug)]
pub struct PostgresDialect;

/// Shared dialect instance.
pub static POSTGRES_DIALECT: PostgresDialect = PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn column_type(&self, ty: AttrType, _extra: &AttrExtra) -> Result<String> {
        Ok(match ty {
            AttrType::Int | AttrType::Relation => "BIGINT".to_string(),
            AttrType::Str => "TEXT".to_string(),
            AttrType::Date => "DATE".to_string(),
            AttrType::DateTime => "TIMESTAMPTZ".to_string(),
            AttrType::Dict | AttrType::List => "JSONB".to_string(),
            AttrType::Flag => "BIGINT".to_string(),
        })
    }

    fn constraint_sql(&self, flags: ColumnFlags, extra: &AttrExtra) -> Result<String> {
        let mut parts: Vec<String> = Vec::new();
        let mut flags = flags;
        if flags.contains(ColumnFlags::PRIMARY_KEY | ColumnFlags::AUTO_INCREMENT) {
            parts.push("GENERATED ALWAYS AS IDENTITY PRIMARY KEY".to_string());
            flags = flags.without(ColumnFlags::PRIMARY_KEY | ColumnFlags::AUTO_INCREMENT);
        }
        for flag in flags.iter() {
            if flag == ColumnFlags::NOT_NULL {
                parts.push("NOT NULL".to_string());
            } else if flag == ColumnFlags::PRIMARY_KEY {
                parts.push("PRIMARY KEY".to_string());
            } else if flag == ColumnFlags::UNIQUE {
                parts.push("UNIQUE".to_string());
            } else if flag == ColumnFlags::FOREIGN_KEY {
                let target = extra.relation.as_deref().ok_or_else(|| {
                    Error::invalid_statement("foreign key requires a relation target")
                })?;
                parts.push(format!("REFERENCES {target}"));
            } else if flag == ColumnFlags::DEFAULT {
                match extra.default.as_deref() {
                    Some(value) => parts.push(format!("DEFAULT {value}")),
                    None => parts.push("DEFAULT".to_string()),
                }
            } else if flag == ColumnFlags::DEFAULT_CURRENT_TS {
                parts.push("DEFAULT CURRENT_TIMESTAMP".to_string());
            } else {
                return Err(Error::invalid_statement(format!(
                    "unsupported column constraint for postgres: {flag:?}"
                )));
            }
        }
        Ok(parts.join(" "))
    }

    fn template(&self, template: SqlTemplate) -> Option<&'static str> {
        match template {
            SqlTemplate::DbVersion => Some("SELECT version() AS version"),
            _ => None,
        }
    }
}

/// PostgreSQL backend stub: renders SQL, refuses to connect.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    host: String,
    db: String,
}

impl PostgresBackend {
    /// Describe the (unreachable) server.
    pub fn new(host: impl Into<String>, db: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            db: db.into(),
        }
    }

    fn unavailable(&self) -> Error {
        Error::operational(format!(
            "PostgreSQL backend is not available (host '{}', db '{}')",
            self.host, self.db
        ))
    }
}

/// Placeholder connection type; never constructed.
#[derive(Debug)]
pub struct PostgresConnection {
    _private: (),
}

impl Connection for PostgresConnection {
    fn execute(
        &mut self,
        _cx: &Cx,
        _sql: &str,
        _params: &SqlParams,
    ) -> impl std::future::Future<Output = Outcome<ExecResult, Error>> + Send {
        async move { Outcome::Err(Error::operational("PostgreSQL backend is not available")) }
    }

    fn query(
        &mut self,
        _cx: &Cx,
        _sql: &str,
        _params: &SqlParams,
    ) -> impl std::future::Future<Output = Outcome<Vec<Row>, Error>> + Send {
        async move { Outcome::Err(Error::operational("PostgreSQL backend is not available")) }
    }

    fn begin(&mut self, _cx: &Cx) -> impl std::future::Future<Output = Outcome<(), Error>> + Send {
        async move { Outcome::Err(Error::operational("PostgreSQL backend is not available")) }
    }

    fn commit(&mut self, _cx: &Cx) -> impl std::future::Future<Output = Outcome<(), Error>> + Send {
        async move { Outcome::Err(Error::operational("PostgreSQL backend is not available")) }
    }

    fn rollback(
        &mut self,
        _cx: &Cx,
    ) -> impl std::future::Future<Output = Outcome<(), Error>> + Send {
        async move { Outcome::Err(Error::operational("PostgreSQL backend is not available")) }
    }

    fn close(&mut self, _cx: &Cx) -> impl std::future::Future<Output = Outcome<(), Error>> + Send {
        async move { Outcome::Ok(()) }
    }
}

impl Backend for PostgresBackend {
    type Conn = PostgresConnection;

    fn dialect(&self) -> &'static dyn Dialect {
        &POSTGRES_DIALECT
    }

    fn connect(
        &self,
        _cx: &Cx,
    ) -> impl std::future::Future<Output = Outcome<Self::Conn, Error>> + Send {
        let err = self.unavailable();
        async move { Outcome::Err(err) }
    }

    fn table_info(
        &self,
        _cx: &Cx,
        _table: &str,
    ) -> impl std::future::Future<Output = Outcome<BTreeMap<String, String>, Error>> + Send {
        let err = self.unavailable();
        async move { Outcome::Err(err) }
    }

    fn table_list(
        &self,
        _cx: &Cx,
    ) -> impl std::future::Future<Output = Outcome<Vec<String>, Error>> + Send {
        let err = self.unavailable();
        async move { Outcome::Err(err) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asupersync::runtime::RuntimeBuilder;

    #[test]
    fn test_dialect_renders_ddl_vocabulary() {
        let d = &POSTGRES_DIALECT;
        assert_eq!(
            d.column_type(AttrType::Dict, &AttrExtra::none()).unwrap(),
            "JSONB"
        );
        assert_eq!(
            d.constraint_sql(
                ColumnFlags::PRIMARY_KEY | ColumnFlags::AUTO_INCREMENT,
                &AttrExtra::none()
            )
            .unwrap(),
            "GENERATED ALWAYS AS IDENTITY PRIMARY KEY"
        );
    }

    #[test]
    fn test_connect_reports_unavailable() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let backend = PostgresBackend::new("db.local", "moneta");
        rt.block_on(async {
            match backend.connect(&cx).await {
                Outcome::Err(Error::Operational(msg)) => {
                    assert!(msg.contains("not available"));
                }
                _ => panic!("expected an operational error"),
            }
        });
    }
}
