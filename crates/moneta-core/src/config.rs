//! Backend configuration input.
//!
//! The embedding application supplies a mapping with a backend
//! discriminator and backend-specific keys; this module gives that mapping
//! a typed, validated shape.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// MySQL-protocol server flavor.
///
/// The driver asserts the live server's version banner against this on
/// first connection and reports a configuration error on mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MySqlFlavor {
    /// Oracle MySQL.
    #[default]
    MySql,
    /// MariaDB.
    MariaDb,
}

impl MySqlFlavor {
    /// Display name matching the server banner vocabulary.
    pub fn name(self) -> &'static str {
        match self {
            MySqlFlavor::MySql => "MySQL",
            MySqlFlavor::MariaDb => "MariaDB",
        }
    }
}

/// Typed backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DbConfig {
    /// SQLite file database.
    Sqlite {
        /// Path of the database file.
        file: PathBuf,
    },
    /// MySQL or MariaDB server.
    Mysql {
        /// Hostname or address.
        host: String,
        /// Database (schema) name.
        db: String,
        /// Username.
        user: String,
        /// Password.
        password: String,
        /// Expected server flavor.
        #[serde(default)]
        flavor: MySqlFlavor,
        /// Optional client TLS certificate path; requires `tls_key`.
        #[serde(default)]
        tls_cert: Option<PathBuf>,
        /// Optional client TLS key path; requires `tls_cert`.
        #[serde(default)]
        tls_key: Option<PathBuf>,
    },
    /// PostgreSQL server (stub backend).
    Postgres {
        /// Hostname or address.
        host: String,
        /// Database name.
        db: String,
    },
}

impl DbConfig {
    /// Backend discriminator for logs and status reports.
    pub fn backend_name(&self) -> &'static str {
        match self {
            DbConfig::Sqlite { .. } => "sqlite",
            DbConfig::Mysql { flavor, .. } => match flavor {
                MySqlFlavor::MySql => "mysql",
                MySqlFlavor::MariaDb => "mariadb",
            },
            DbConfig::Postgres { .. } => "postgres",
        }
    }

    /// Reject malformed or contradictory settings.
    pub fn validate(&self) -> Result<()> {
        match self {
            DbConfig::Sqlite { file } => {
                if file.as_os_str().is_empty() {
                    return Err(Error::configuration("sqlite backend requires a file path"));
                }
                Ok(())
            }
            DbConfig::Mysql {
                host,
                db,
                user,
                tls_cert,
                tls_key,
                ..
            } => {
                if host.is_empty() || db.is_empty() || user.is_empty() {
                    return Err(Error::configuration(
                        "mysql backend requires host, db, and user",
                    ));
                }
                if tls_cert.is_some() != tls_key.is_some() {
                    return Err(Error::configuration(
                        "TLS requires both certificate and key paths",
                    ));
                }
                Ok(())
            }
            DbConfig::Postgres { host, db } => {
                if host.is_empty() || db.is_empty() {
                    return Err(Error::configuration(
                        "postgres backend requires host and db",
                    ));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_requires_path() {
        let cfg = DbConfig::Sqlite {
            file: PathBuf::new(),
        };
        assert_eq!(cfg.validate().unwrap_err().kind(), "configuration");
    }

    #[test]
    fn test_mysql_tls_requires_both_paths() {
        let cfg = DbConfig::Mysql {
            host: "db.local".into(),
            db: "moneta".into(),
            user: "moneta".into(),
            password: "s3cret".into(),
            flavor: MySqlFlavor::MariaDb,
            tls_cert: Some(PathBuf::from("/etc/ssl/client.pem")),
            tls_key: None,
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.message().contains("certificate and key"));
    }

    #[test]
    fn test_backend_name_tracks_flavor() {
        let cfg = DbConfig::Mysql {
            host: "h".into(),
            db: "d".into(),
            user: "u".into(),
            password: String::new(),
            flavor: MySqlFlavor::MariaDb,
            tls_cert: None,
            tls_key: None,
        };
        assert_eq!(cfg.backend_name(), "mariadb");
    }

    #[test]
    fn test_deserializes_from_tagged_mapping() {
        let cfg: DbConfig = serde_json::from_str(
            r#"{"backend": "sqlite", "file": "/var/lib/moneta/budget.db"}"#,
        )
        .unwrap();
        assert_eq!(cfg.backend_name(), "sqlite");
        assert!(cfg.validate().is_ok());
    }
}
