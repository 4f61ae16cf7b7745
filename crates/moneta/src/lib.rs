//! Moneta persistence core facade.
//!
//! Re-exports the whole stack and provides [`Db`], the config-driven entry
//! point: it selects a backend from the configuration mapping and reports
//! an unreachable or unsupported database as a degraded [`DbStatus`]
//! instead of raising — the embedding application polls the status rather
//! than catching errors at the top level.

use std::sync::Arc;

use asupersync::{Cx, Outcome};
use moneta_core::config::DbConfig;
use moneta_core::error::Error;
use moneta_model::bo::SchemaRegistry;
use moneta_model::persistence::Persistence;
use moneta_mysql::{MySqlBackend, MySqlConfig};
use moneta_postgres::PostgresBackend;
use moneta_sqlite::SqliteBackend;

pub use moneta_core::{
    AttrExtra, AttrType, Backend, ColumnFlags, Connection, Cx as CoreCx, DbConfig as Config,
    Dialect, Error as CoreError, ExecResult, MySqlFlavor, Result, Row, SqlParams, SqlTemplate,
    Value,
};

/// Commonly used types, one `use` away.
pub mod prelude {
    pub use asupersync::{Cx, Outcome};
    pub use moneta_core::{
        AttrType, ColumnFlags, DbConfig, Error, MySqlFlavor, Result, Row, Value,
    };
    pub use moneta_model::{
        BoCallback, BoFuture, BoMeta, BoMetaBuilder, BusinessObject, ChangeHub, ChangeSubscriber,
        FlagType, FlagValue, ListPayload, ListSubscription, Persistence, Repository,
        SchemaRegistry, TransientRegistry,
    };
    pub use moneta_schema::{check_schema, register_schema_version_type};
    pub use moneta_session::{ConnectionContext, SqlContext, Transaction};
    pub use moneta_sql::{Expr, JoinOperator, Sql, Statement};

    pub use crate::{Db, DbHandle, DbStatus};
}

/// Health of the configured database, polled by the embedding
/// application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbStatus {
    /// The backend is usable.
    Ready,
    /// The backend is unreachable or unsupported; the reason says why.
    Degraded(String),
}

/// The selected backend's persistence stack.
pub enum DbHandle {
    /// SQLite file database.
    Sqlite(Arc<Persistence<SqliteBackend>>),
    /// MySQL or MariaDB server.
    MySql(Arc<Persistence<MySqlBackend>>),
    /// PostgreSQL stub: statements render, connections fail.
    Postgres(Arc<Persistence<PostgresBackend>>),
    /// No usable backend.
    Unavailable,
}

/// Config-driven database entry point.
pub struct Db {
    status: DbStatus,
    handle: DbHandle,
}

impl Db {
    /// Select and set up a backend from the configuration mapping.
    ///
    /// Failures do not raise: the returned handle carries a degraded
    /// status instead.
    pub fn open(config: &DbConfig, registry: Arc<SchemaRegistry>) -> Db {
        if let Err(e) = config.validate() {
            return Self::degraded(e.to_string());
        }
        match config {
            DbConfig::Sqlite { file } => {
                let backend = SqliteBackend::new(file.clone());
                Db {
                    status: DbStatus::Ready,
                    handle: DbHandle::Sqlite(Arc::new(Persistence::new(backend, registry))),
                }
            }
            DbConfig::Mysql { .. } => {
                let mysql_config = match MySqlConfig::from_db_config(config) {
                    Ok(c) => c,
                    Err(e) => return Self::degraded(e.to_string()),
                };
                match MySqlBackend::connect(mysql_config) {
                    Ok(backend) => Db {
                        status: DbStatus::Ready,
                        handle: DbHandle::MySql(Arc::new(Persistence::new(backend, registry))),
                    },
                    Err(e) => Self::degraded(e.to_string()),
                }
            }
            DbConfig::Postgres { host, db } => {
                let backend = PostgresBackend::new(host.clone(), db.clone());
                let reason =
                    format!("PostgreSQL backend is not available (host '{host}', db '{db}')");
                tracing::warn!(%reason, "database unavailable, running degraded");
                Db {
                    status: DbStatus::Degraded(reason),
                    handle: DbHandle::Postgres(Arc::new(Persistence::new(backend, registry))),
                }
            }
        }
    }

    fn degraded(reason: String) -> Db {
        tracing::warn!(%reason, "database unavailable, running degraded");
        Db {
            status: DbStatus::Degraded(reason),
            handle: DbHandle::Unavailable,
        }
    }

    /// Current backend status.
    pub fn status(&self) -> &DbStatus {
        &self.status
    }

    /// The selected backend's persistence stack.
    pub fn handle(&self) -> &DbHandle {
        &self.handle
    }

    /// Run the schema compatibility check against the selected backend.
    ///
    /// Schema incompatibility is fatal for this connection attempt and is
    /// surfaced as the error, not as a degraded status.
    pub async fn check_schema(&self, cx: &Cx) -> Outcome<(), Error> {
        match &self.handle {
            DbHandle::Sqlite(p) => moneta_schema::check_schema(p.as_ref(), cx).await,
            DbHandle::MySql(p) => moneta_schema::check_schema(p.as_ref(), cx).await,
            DbHandle::Postgres(p) => moneta_schema::check_schema(p.as_ref(), cx).await,
            DbHandle::Unavailable => match &self.status {
                DbStatus::Degraded(reason) => Outcome::Err(Error::configuration(reason.clone())),
                DbStatus::Ready => Outcome::Err(Error::configuration("no backend selected")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_open_sqlite_is_ready() {
        let registry = Arc::new(SchemaRegistry::new());
        let config = DbConfig::Sqlite {
            file: std::env::temp_dir().join("moneta-facade-open.db"),
        };
        let db = Db::open(&config, registry);
        assert_eq!(db.status(), &DbStatus::Ready);
        assert!(matches!(db.handle(), DbHandle::Sqlite(_)));
    }

    #[test]
    fn test_invalid_config_degrades() {
        let registry = Arc::new(SchemaRegistry::new());
        let config = DbConfig::Sqlite {
            file: PathBuf::new(),
        };
        let db = Db::open(&config, registry);
        match db.status() {
            DbStatus::Degraded(reason) => assert!(reason.contains("file path")),
            DbStatus::Ready => panic!("expected degraded status"),
        }
    }

    #[test]
    fn test_postgres_degrades_instead_of_raising() {
        let registry = Arc::new(SchemaRegistry::new());
        let config = DbConfig::Postgres {
            host: "db.local".into(),
            db: "moneta".into(),
        };
        let db = Db::open(&config, registry);
        match db.status() {
            DbStatus::Degraded(reason) => assert!(reason.contains("PostgreSQL")),
            DbStatus::Ready => panic!("expected degraded status"),
        }
        assert!(matches!(db.handle(), DbHandle::Postgres(_)));
    }
}
