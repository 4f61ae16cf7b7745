//! SQLite SQL vocabulary.

use moneta_core::error::{Error, Result};
use moneta_core::flags::ColumnFlags;
use moneta_core::types::{AttrExtra, AttrType};
use moneta_core::{Dialect, SqlTemplate};

/// Declared column type for JSON-backed attributes.
pub const SQLITE_JSON_TYPE: &str = "JSON";
/// Declared column type for bitset-flag attributes.
pub const SQLITE_FLAG_TYPE: &str = "FLAG";

/// The SQLite dialect strategy.
#[derive(Debug)]
pub struct SqliteDialect;

/// Shared dialect instance handed to statement builders.
pub static SQLITE_DIALECT: SqliteDialect = SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn column_type(&self, ty: AttrType, extra: &AttrExtra) -> Result<String> {
        Ok(match ty {
            AttrType::Int | AttrType::Relation => "INTEGER".to_string(),
            AttrType::Str | AttrType::Date | AttrType::DateTime => "TEXT".to_string(),
            AttrType::Dict | AttrType::List => SQLITE_JSON_TYPE.to_string(),
            AttrType::Flag => flag_type(&extra.flag_members),
        })
    }

    fn constraint_sql(&self, flags: ColumnFlags, extra: &AttrExtra) -> Result<String> {
        let mut parts: Vec<String> = Vec::new();
        let mut flags = flags;
        if flags.contains(ColumnFlags::PRIMARY_KEY | ColumnFlags::AUTO_INCREMENT) {
            parts.push("PRIMARY KEY AUTOINCREMENT".to_string());
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
                    "unsupported column constraint for sqlite: {flag:?}"
                )));
            }
        }
        Ok(parts.join(" "))
    }

    fn template(&self, template: SqlTemplate) -> Option<&'static str> {
        match template {
            SqlTemplate::TableList => Some(
                "SELECT name as table_name FROM sqlite_master \
                 WHERE type = 'table' and substr(name,1,7) <> 'sqlite_'",
            ),
            SqlTemplate::TableSql => {
                Some("SELECT sql FROM sqlite_master WHERE type='table' AND name = :table")
            }
            SqlTemplate::ViewList => Some(
                "SELECT name as view_name FROM sqlite_master \
                 WHERE type = 'view' and substr(name,1,7) <> 'sqlite_'",
            ),
            SqlTemplate::TableInfo | SqlTemplate::DbVersion => None,
        }
    }
}

/// SQLite stores flag bitsets in their textual encoding regardless of the
/// declared member count.
fn flag_type(_members: &[String]) -> String {
    SQLITE_FLAG_TYPE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_map() {
        let d = &SQLITE_DIALECT;
        assert_eq!(
            d.column_type(AttrType::Int, &AttrExtra::none()).unwrap(),
            "INTEGER"
        );
        assert_eq!(
            d.column_type(AttrType::Dict, &AttrExtra::none()).unwrap(),
            "JSON"
        );
        assert_eq!(
            d.column_type(AttrType::Flag, &AttrExtra::flag_members(&["a", "b"]))
                .unwrap(),
            "FLAG"
        );
        assert_eq!(
            d.column_type(AttrType::Relation, &AttrExtra::relation("accounts"))
                .unwrap(),
            "INTEGER"
        );
    }

    #[test]
    fn test_constraints() {
        let d = &SQLITE_DIALECT;
        assert_eq!(
            d.constraint_sql(
                ColumnFlags::PRIMARY_KEY | ColumnFlags::AUTO_INCREMENT,
                &AttrExtra::none()
            )
            .unwrap(),
            "PRIMARY KEY AUTOINCREMENT"
        );
        assert_eq!(
            d.constraint_sql(ColumnFlags::NOT_NULL | ColumnFlags::UNIQUE, &AttrExtra::none())
                .unwrap(),
            "NOT NULL UNIQUE"
        );
        assert_eq!(
            d.constraint_sql(ColumnFlags::FOREIGN_KEY, &AttrExtra::relation("accounts"))
                .unwrap(),
            "REFERENCES accounts"
        );
        assert_eq!(
            d.constraint_sql(ColumnFlags::DEFAULT_CURRENT_TS, &AttrExtra::none())
                .unwrap(),
            "DEFAULT CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn test_foreign_key_requires_target() {
        let err = SQLITE_DIALECT
            .constraint_sql(ColumnFlags::FOREIGN_KEY, &AttrExtra::none())
            .unwrap_err();
        assert_eq!(err.kind(), "invalid-statement");
    }

    #[test]
    fn test_returning_supported() {
        assert!(SQLITE_DIALECT.supports_returning());
    }
}
