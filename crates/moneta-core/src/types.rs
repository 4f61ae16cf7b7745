//! Semantic attribute types and their extra column parameters.

use serde::{Deserialize, Serialize};

/// Semantic type of a business-object attribute.
///
/// Drivers map these onto native column types through their
/// [`Dialect::column_type`](crate::Dialect::column_type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrType {
    /// Integer.
    Int,
    /// Text.
    Str,
    /// Calendar date.
    Date,
    /// Timestamp.
    DateTime,
    /// JSON object.
    Dict,
    /// JSON array.
    List,
    /// Bitset flag value.
    Flag,
    /// Foreign-key reference to another business object.
    Relation,
}

impl AttrType {
    /// Stable lowercase name, used in logs and payloads.
    pub fn name(self) -> &'static str {
        match self {
            AttrType::Int => "int",
            AttrType::Str => "str",
            AttrType::Date => "date",
            AttrType::DateTime => "datetime",
            AttrType::Dict => "dict",
            AttrType::List => "list",
            AttrType::Flag => "flag",
            AttrType::Relation => "relation",
        }
    }
}

/// Extra parameters attached to an attribute's column definition.
///
/// Which fields are meaningful depends on the constraint flags: a foreign
/// key names its target table, a flag column its member names, a DEFAULT
/// constraint its default expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrExtra {
    /// Target table of a foreign-key relation.
    pub relation: Option<String>,
    /// Declared member names of a flag attribute.
    pub flag_members: Vec<String>,
    /// Default value expression for a DEFAULT constraint.
    pub default: Option<String>,
}

impl AttrExtra {
    /// No extra parameters.
    pub fn none() -> Self {
        Self::default()
    }

    /// Extra parameters for a relation targeting `table`.
    pub fn relation(table: impl Into<String>) -> Self {
        Self {
            relation: Some(table.into()),
            ..Self::default()
        }
    }

    /// Extra parameters for a flag attribute with the given members.
    pub fn flag_members(members: &[&str]) -> Self {
        Self {
            flag_members: members.iter().map(|m| (*m).to_string()).collect(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_type_names() {
        assert_eq!(AttrType::Int.name(), "int");
        assert_eq!(AttrType::DateTime.name(), "datetime");
        assert_eq!(AttrType::Relation.name(), "relation");
    }

    #[test]
    fn test_extra_constructors() {
        let rel = AttrExtra::relation("accounts");
        assert_eq!(rel.relation.as_deref(), Some("accounts"));
        let flags = AttrExtra::flag_members(&["cleared", "pending"]);
        assert_eq!(flags.flag_members, vec!["cleared", "pending"]);
    }
}
