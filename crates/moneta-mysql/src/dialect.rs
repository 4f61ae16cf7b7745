//! MySQL/MariaDB SQL vocabulary.
//!
//! The two flavors share the type and constraint maps; they differ in the
//! RETURNING capability, which MariaDB supports and strict MySQL does not.

use moneta_core::config::MySqlFlavor;
use moneta_core::error::{Error, Result};
use moneta_core::flags::ColumnFlags;
use moneta_core::types::{AttrExtra, AttrType};
use moneta_core::{Dialect, SqlTemplate};

/// Declared column type for JSON-backed attributes.
pub const MYSQL_JSON_TYPE: &str = "JSON";
/// Declared column type for bitset-flag attributes.
pub const MYSQL_FLAG_TYPE: &str = "BIT(64)";

/// The MySQL-protocol dialect strategy.
#[derive(Debug)]
pub struct MySqlDialect {
    flavor: MySqlFlavor,
}

/// Dialect instance for strict MySQL.
pub static MYSQL_DIALECT: MySqlDialect = MySqlDialect {
    flavor: MySqlFlavor::MySql,
};

/// Dialect instance for MariaDB.
pub static MARIADB_DIALECT: MySqlDialect = MySqlDialect {
    flavor: MySqlFlavor::MariaDb,
};

/// The shared dialect instance for a flavor.
pub fn dialect_for(flavor: MySqlFlavor) -> &'static MySqlDialect {
    match flavor {
        MySqlFlavor::MySql => &MYSQL_DIALECT,
        MySqlFlavor::MariaDb => &MARIADB_DIALECT,
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        match self.flavor {
            MySqlFlavor::MySql => "mysql",
            MySqlFlavor::MariaDb => "mariadb",
        }
    }

    fn column_type(&self, ty: AttrType, extra: &AttrExtra) -> Result<String> {
        Ok(match ty {
            AttrType::Int | AttrType::Relation => "INT".to_string(),
            AttrType::Str => "VARCHAR(100)".to_string(),
            AttrType::Date => "DATE".to_string(),
            AttrType::DateTime => "DATETIME".to_string(),
            AttrType::Dict | AttrType::List => MYSQL_JSON_TYPE.to_string(),
            AttrType::Flag => flag_type(&extra.flag_members),
        })
    }

    fn constraint_sql(&self, flags: ColumnFlags, extra: &AttrExtra) -> Result<String> {
        let mut parts: Vec<String> = Vec::new();
        let mut flags = flags;
        if flags.contains(ColumnFlags::PRIMARY_KEY | ColumnFlags::AUTO_INCREMENT) {
            parts.push("AUTO_INCREMENT PRIMARY KEY".to_string());
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
                parts.push(format!("REFERENCES {target} (id)"));
            } else if flag == ColumnFlags::DEFAULT {
                match extra.default.as_deref() {
                    Some(value) => parts.push(format!("DEFAULT {value}")),
                    None => parts.push("DEFAULT".to_string()),
                }
            } else if flag == ColumnFlags::DEFAULT_CURRENT_TS {
                parts.push("DEFAULT CURRENT_TIMESTAMP".to_string());
            } else {
                return Err(Error::invalid_statement(format!(
                    "unsupported column constraint for {}: {flag:?}",
                    self.name()
                )));
            }
        }
        Ok(parts.join(" "))
    }

    fn template(&self, template: SqlTemplate) -> Option<&'static str> {
        match template {
            SqlTemplate::TableList => Some(
                "SELECT table_name AS table_name FROM information_schema.tables \
                 WHERE table_schema = DATABASE()",
            ),
            SqlTemplate::TableInfo => Some(
                "SELECT columns.COLUMN_NAME AS name, \
                 CONCAT_WS(' ', \
                     columns.COLUMN_NAME, \
                     UPPER(CASE WHEN SUBSTR(constraints.CHECK_CLAUSE, 1, 4) = 'json' THEN 'json' \
                         WHEN columns.DATA_TYPE IN ( 'varchar', 'bit' ) THEN columns.COLUMN_TYPE \
                         ELSE columns.DATA_TYPE END), \
                     UPPER(CASE WHEN columns.IS_NULLABLE <> 'YES' AND columns.COLUMN_KEY <> 'PRI' THEN 'NOT NULL' \
                         ELSE NULL END), \
                     UPPER(CASE WHEN columns.EXTRA <> '' THEN columns.EXTRA ELSE NULL END), \
                     UPPER(CASE WHEN key_cols.CONSTRAINT_NAME = 'PRIMARY' THEN 'PRIMARY KEY' \
                         ELSE NULL END), \
                     UPPER(CASE WHEN columns.COLUMN_DEFAULT IS NULL OR columns.COLUMN_DEFAULT = 'NULL' THEN NULL \
                         WHEN columns.COLUMN_DEFAULT = 'current_timestamp()' THEN 'default current_timestamp' \
                         ELSE CONCAT('default', columns.COLUMN_DEFAULT) END), \
                     CASE WHEN key_cols.REFERENCED_TABLE_NAME IS NOT NULL \
                         THEN CONCAT('REFERENCES ', key_cols.REFERENCED_TABLE_NAME, ' (', key_cols.REFERENCED_COLUMN_NAME, ')') \
                         ELSE NULL END \
                     ) AS column_info \
                 FROM information_schema.columns columns \
                 LEFT JOIN information_schema.check_constraints constraints \
                     ON columns.TABLE_SCHEMA = constraints.CONSTRAINT_SCHEMA \
                         AND columns.TABLE_NAME = constraints.TABLE_NAME \
                         AND columns.COLUMN_NAME = constraints.CONSTRAINT_NAME \
                 LEFT JOIN information_schema.key_column_usage key_cols \
                     ON columns.TABLE_SCHEMA = key_cols.TABLE_SCHEMA \
                         AND columns.TABLE_NAME = key_cols.TABLE_NAME \
                         AND columns.COLUMN_NAME = key_cols.COLUMN_NAME \
                 WHERE columns.TABLE_NAME = :table \
                     AND columns.table_schema = DATABASE()",
            ),
            SqlTemplate::ViewList => Some(
                "SELECT table_name AS view_name FROM information_schema.views \
                 WHERE table_schema = DATABASE()",
            ),
            SqlTemplate::DbVersion => Some("SELECT VERSION() AS version"),
            SqlTemplate::TableSql => None,
        }
    }

    fn supports_returning(&self) -> bool {
        // MariaDB grew INSERT/UPDATE ... RETURNING; strict MySQL has not.
        matches!(self.flavor, MySqlFlavor::MariaDb)
    }
}

/// MySQL stores flag bitsets in a fixed 64-bit BIT column, wide enough for
/// any declared member set.
fn flag_type(_members: &[String]) -> String {
    MYSQL_FLAG_TYPE.to_string()
}

/// Assert the live server's version banner against the configured flavor.
///
/// A MariaDB banner under a MySQL configuration (and vice versa) is a
/// configuration error, reported on first connection.
pub fn check_version_banner(banner: &str, flavor: MySqlFlavor) -> Result<()> {
    let is_mariadb = banner.contains("MariaDB");
    match flavor {
        MySqlFlavor::MariaDb if !is_mariadb => Err(Error::configuration(
            "connected DB is not a MariaDB database; consider changing the configuration to 'MySQL'",
        )),
        MySqlFlavor::MySql if is_mariadb => Err(Error::configuration(
            "connected DB is not a MySQL database; consider changing the configuration to 'MariaDB'",
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_map() {
        let d = &MYSQL_DIALECT;
        assert_eq!(
            d.column_type(AttrType::Int, &AttrExtra::none()).unwrap(),
            "INT"
        );
        assert_eq!(
            d.column_type(AttrType::Str, &AttrExtra::none()).unwrap(),
            "VARCHAR(100)"
        );
        assert_eq!(
            d.column_type(AttrType::Flag, &AttrExtra::flag_members(&["a"]))
                .unwrap(),
            "BIT(64)"
        );
    }

    #[test]
    fn test_constraints() {
        let d = &MARIADB_DIALECT;
        assert_eq!(
            d.constraint_sql(
                ColumnFlags::PRIMARY_KEY | ColumnFlags::AUTO_INCREMENT,
                &AttrExtra::none()
            )
            .unwrap(),
            "AUTO_INCREMENT PRIMARY KEY"
        );
        assert_eq!(
            d.constraint_sql(ColumnFlags::FOREIGN_KEY, &AttrExtra::relation("accounts"))
                .unwrap(),
            "REFERENCES accounts (id)"
        );
    }

    #[test]
    fn test_returning_split_by_flavor() {
        assert!(!MYSQL_DIALECT.supports_returning());
        assert!(MARIADB_DIALECT.supports_returning());
    }

    #[test]
    fn test_version_banner_check() {
        assert!(check_version_banner("8.4.2", MySqlFlavor::MySql).is_ok());
        assert!(
            check_version_banner("11.4.2-MariaDB-log", MySqlFlavor::MariaDb).is_ok()
        );

        let err = check_version_banner("11.4.2-MariaDB-log", MySqlFlavor::MySql).unwrap_err();
        assert_eq!(err.kind(), "configuration");
        assert!(err.message().contains("MariaDB"));

        let err = check_version_banner("8.4.2", MySqlFlavor::MariaDb).unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn test_templates_present() {
        assert!(MYSQL_DIALECT.template(SqlTemplate::TableInfo).is_some());
        assert!(MYSQL_DIALECT.template(SqlTemplate::DbVersion).is_some());
        assert!(MYSQL_DIALECT.template(SqlTemplate::TableSql).is_none());
    }
}
