//! Attribute descriptors.
//!
//! One [`AttrSpec`] per declared attribute: the name, the semantic type,
//! the constraint flags, extra column parameters, and the technical
//! marker. The spec validates and converts values on write; registration
//! happens once per type through the
//! [`BoMetaBuilder`](crate::bo::BoMetaBuilder).

use std::sync::Arc;

use moneta_core::error::{Error, Result};
use moneta_core::flags::ColumnFlags;
use moneta_core::types::{AttrExtra, AttrType};
use moneta_core::value::Value;

use crate::convert::{normalize_date, normalize_datetime};
use crate::flags::FlagType;

/// Description of one business-object attribute.
#[derive(Debug, Clone)]
pub struct AttrSpec {
    /// Attribute (and column) name.
    pub name: String,
    /// Semantic type.
    pub attr_type: AttrType,
    /// Constraint flags.
    pub flags: ColumnFlags,
    /// Extra column parameters (relation target, flag members, default).
    pub extra: AttrExtra,
    /// Technical attributes are managed by the persistence layer, not the
    /// application (id, last_updated).
    pub technical: bool,
    /// Flag vocabulary of a flag attribute.
    pub flag_type: Option<Arc<FlagType>>,
    /// Business-object type name of a relation attribute.
    pub relation_type: Option<String>,
}

impl AttrSpec {
    /// A plain attribute of the given semantic type.
    pub fn new(name: impl Into<String>, attr_type: AttrType, flags: ColumnFlags) -> Self {
        Self {
            name: name.into(),
            attr_type,
            flags,
            extra: AttrExtra::none(),
            technical: false,
            flag_type: None,
            relation_type: None,
        }
    }

    /// Mark as technical.
    pub fn technical(mut self) -> Self {
        self.technical = true;
        self
    }

    /// A flag attribute over the given vocabulary.
    pub fn flag(name: impl Into<String>, flag_type: Arc<FlagType>, flags: ColumnFlags) -> Self {
        let members: Vec<&str> = flag_type.members().iter().map(String::as_str).collect();
        Self {
            name: name.into(),
            attr_type: AttrType::Flag,
            flags,
            extra: AttrExtra::flag_members(&members),
            technical: false,
            flag_type: Some(flag_type),
            relation_type: None,
        }
    }

    /// A relation attribute referencing another business-object type.
    ///
    /// The foreign-key flag is always set on relations.
    pub fn relation(
        name: impl Into<String>,
        related_type: impl Into<String>,
        related_table: impl Into<String>,
        flags: ColumnFlags,
    ) -> Self {
        Self {
            name: name.into(),
            attr_type: AttrType::Relation,
            flags: flags | ColumnFlags::FOREIGN_KEY,
            extra: AttrExtra::relation(related_table),
            technical: false,
            flag_type: None,
            relation_type: Some(related_type.into()),
        }
    }

    /// True when writes must not be null.
    pub fn not_null(&self) -> bool {
        self.flags.contains(ColumnFlags::NOT_NULL)
    }

    /// Validate and convert a value for assignment to this attribute.
    ///
    /// Null is rejected for not-null attributes; otherwise the value must
    /// satisfy the semantic type's predicate. Dates and timestamps
    /// normalize their textual form; flag attributes accept the
    /// comma-separated member encoding.
    pub fn check_value(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            if self.not_null() {
                return Err(Error::validation(format!(
                    "value must not be null for not-null attribute '{}'",
                    self.name
                )));
            }
            return Ok(Value::Null);
        }
        match self.attr_type {
            AttrType::Int | AttrType::Relation => match value {
                Value::Int(_) => Ok(value),
                other => Err(self.type_error(&other)),
            },
            AttrType::Str => match value {
                Value::Text(_) => Ok(value),
                other => Err(self.type_error(&other)),
            },
            AttrType::Date => match &value {
                Value::Date(text) | Value::Text(text) => {
                    Ok(Value::Date(normalize_date(text).map_err(|_| {
                        self.type_error(&value)
                    })?))
                }
                other => Err(self.type_error(other)),
            },
            AttrType::DateTime => match &value {
                Value::Timestamp(text) | Value::Text(text) => {
                    Ok(Value::Timestamp(normalize_datetime(text).map_err(|_| {
                        self.type_error(&value)
                    })?))
                }
                other => Err(self.type_error(other)),
            },
            AttrType::Dict => match &value {
                Value::Json(json) if json.is_object() => Ok(value),
                other => Err(self.type_error(other)),
            },
            AttrType::List => match &value {
                Value::Json(json) if json.is_array() => Ok(value),
                other => Err(self.type_error(other)),
            },
            AttrType::Flag => {
                let Some(flag_type) = &self.flag_type else {
                    return Err(Error::validation(format!(
                        "flag attribute '{}' has no declared flag type",
                        self.name
                    )));
                };
                match &value {
                    Value::Text(text) => {
                        let decoded = flag_type.decode(text)?;
                        Ok(Value::Text(decoded.encode()))
                    }
                    other => Err(self.type_error(other)),
                }
            }
        }
    }

    fn type_error(&self, value: &Value) -> Error {
        Error::validation(format!(
            "'{value:?}' invalid to set attribute '{}' of type {}",
            self.name,
            self.attr_type.name()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_null_rejects_null_for_every_type() {
        for attr_type in [
            AttrType::Int,
            AttrType::Str,
            AttrType::Date,
            AttrType::DateTime,
            AttrType::Dict,
            AttrType::List,
        ] {
            let spec = AttrSpec::new("x", attr_type, ColumnFlags::NOT_NULL);
            let err = spec.check_value(Value::Null).unwrap_err();
            assert_eq!(err.kind(), "validation", "type {attr_type:?}");
        }
    }

    #[test]
    fn test_nullable_accepts_null() {
        let spec = AttrSpec::new("x", AttrType::Int, ColumnFlags::NONE);
        assert_eq!(spec.check_value(Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_int_predicate() {
        let spec = AttrSpec::new("amount", AttrType::Int, ColumnFlags::NONE);
        assert_eq!(spec.check_value(Value::Int(5)).unwrap(), Value::Int(5));
        assert!(spec.check_value(Value::Text("5".into())).is_err());
    }

    #[test]
    fn test_date_normalizes_text() {
        let spec = AttrSpec::new("booked_on", AttrType::Date, ColumnFlags::NONE);
        assert_eq!(
            spec.check_value(Value::Text("2026-08-06".into())).unwrap(),
            Value::Date("2026-08-06".to_string())
        );
        assert!(spec.check_value(Value::Text("not a date".into())).is_err());
    }

    #[test]
    fn test_datetime_normalizes_to_utc() {
        let spec = AttrSpec::new("booked_at", AttrType::DateTime, ColumnFlags::NONE);
        let value = spec
            .check_value(Value::Text("2026-08-06T12:00:00+02:00".into()))
            .unwrap();
        assert_eq!(value, Value::Timestamp("2026-08-06T10:00:00Z".to_string()));
    }

    #[test]
    fn test_dict_requires_object() {
        let spec = AttrSpec::new("meta", AttrType::Dict, ColumnFlags::NONE);
        assert!(
            spec.check_value(Value::Json(serde_json::json!({"k": 1})))
                .is_ok()
        );
        assert!(
            spec.check_value(Value::Json(serde_json::json!([1, 2])))
                .is_err()
        );
    }

    #[test]
    fn test_flag_accepts_member_string() {
        let ty = FlagType::new("state", &["a", "b"]);
        let spec = AttrSpec::flag("state", ty, ColumnFlags::NONE);
        assert_eq!(
            spec.check_value(Value::Text("b, a".into())).unwrap(),
            Value::Text("a,b".to_string())
        );
        assert!(spec.check_value(Value::Text("zzz".into())).is_err());
    }

    #[test]
    fn test_relation_forces_foreign_key_flag() {
        let spec = AttrSpec::relation("account", "account", "accounts", ColumnFlags::NONE);
        assert!(spec.flags.contains(ColumnFlags::FOREIGN_KEY));
        assert_eq!(spec.extra.relation.as_deref(), Some("accounts"));
        assert_eq!(spec.relation_type.as_deref(), Some("account"));
    }
}
