//! Business-object metadata and instances.
//!
//! Types are declared once at program start: a [`BoMetaBuilder`] collects
//! the attribute descriptors, resolves inheritance through an explicit
//! parent chain, and registers the finished [`BoMeta`] in the
//! [`SchemaRegistry`]. Instances are dynamic attribute maps validated
//! through the descriptors.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use moneta_core::error::{Error, Result};
use moneta_core::flags::ColumnFlags;
use moneta_core::row::Row;
use moneta_core::types::AttrType;
use moneta_core::value::Value;

use crate::descriptors::AttrSpec;
use crate::flags::{FlagType, FlagValue};

/// The identity attribute present on every business object.
pub const ID_ATTR: &str = "id";
/// The bookkeeping timestamp present on every business object.
pub const LAST_UPDATED_ATTR: &str = "last_updated";

/// Metadata of one business-object type.
#[derive(Debug)]
pub struct BoMeta {
    type_name: String,
    table: String,
    parent: Option<Arc<BoMeta>>,
    own_attrs: Vec<AttrSpec>,
}

impl BoMeta {
    /// The type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The database table backing this type.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The parent type, when this type was derived.
    pub fn parent(&self) -> Option<&Arc<BoMeta>> {
        self.parent.as_ref()
    }

    /// All attribute descriptions, inherited attributes prepended by
    /// walking the parent chain.
    pub fn attribute_descriptions(&self) -> Vec<AttrSpec> {
        let mut attrs = match &self.parent {
            Some(parent) => parent.attribute_descriptions(),
            None => Vec::new(),
        };
        attrs.extend(self.own_attrs.iter().cloned());
        attrs
    }

    /// Look up one attribute description by name.
    pub fn attr(&self, name: &str) -> Option<AttrSpec> {
        self.attribute_descriptions()
            .into_iter()
            .find(|a| a.name == name)
    }

    /// Name of the primary-key attribute.
    pub fn primary_key(&self) -> Result<String> {
        self.attribute_descriptions()
            .into_iter()
            .find(|a| a.flags.contains(ColumnFlags::PRIMARY_KEY))
            .map(|a| a.name)
            .ok_or_else(|| {
                Error::validation(format!("no primary key defined for '{}'", self.type_name))
            })
    }

    /// Tables of the business-object types this type references.
    pub fn references(&self) -> Vec<String> {
        self.attribute_descriptions()
            .into_iter()
            .filter(|a| a.attr_type == AttrType::Relation)
            .filter_map(|a| a.extra.relation)
            .collect()
    }
}

/// Builder declaring one business-object type.
#[derive(Debug)]
pub struct BoMetaBuilder {
    type_name: String,
    table: Option<String>,
    parent: Option<Arc<BoMeta>>,
    attrs: Vec<AttrSpec>,
}

impl BoMetaBuilder {
    /// Declare a root type. The technical `id` and `last_updated`
    /// attributes are prepended automatically.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            table: None,
            parent: None,
            attrs: vec![
                AttrSpec::new(
                    ID_ATTR,
                    AttrType::Int,
                    ColumnFlags::PRIMARY_KEY | ColumnFlags::AUTO_INCREMENT,
                )
                .technical(),
                AttrSpec::new(
                    LAST_UPDATED_ATTR,
                    AttrType::DateTime,
                    ColumnFlags::DEFAULT_CURRENT_TS,
                )
                .technical(),
            ],
        }
    }

    /// Declare a type derived from `parent`; inherited attributes are
    /// resolved through the parent chain.
    pub fn derive(type_name: impl Into<String>, parent: Arc<BoMeta>) -> Self {
        Self {
            type_name: type_name.into(),
            table: None,
            parent: Some(parent),
            attrs: Vec::new(),
        }
    }

    /// Override the backing table name (default: type name + `s`).
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Register an attribute description.
    ///
    /// A duplicate name is a no-op with a warning, not an error.
    pub fn attribute(mut self, spec: AttrSpec) -> Result<Self> {
        spec.flags.validate()?;
        let known = self.attrs.iter().any(|a| a.name == spec.name)
            || self
                .parent
                .as_ref()
                .is_some_and(|p| p.attr(&spec.name).is_some());
        if known {
            tracing::warn!(
                bo_type = %self.type_name,
                attribute = %spec.name,
                "attribute already registered"
            );
            return Ok(self);
        }
        self.attrs.push(spec);
        Ok(self)
    }

    /// An integer attribute.
    pub fn int(self, name: impl Into<String>, flags: ColumnFlags) -> Result<Self> {
        self.attribute(AttrSpec::new(name, AttrType::Int, flags))
    }

    /// A text attribute.
    pub fn str(self, name: impl Into<String>, flags: ColumnFlags) -> Result<Self> {
        self.attribute(AttrSpec::new(name, AttrType::Str, flags))
    }

    /// A date attribute.
    pub fn date(self, name: impl Into<String>, flags: ColumnFlags) -> Result<Self> {
        self.attribute(AttrSpec::new(name, AttrType::Date, flags))
    }

    /// A datetime attribute.
    pub fn datetime(self, name: impl Into<String>, flags: ColumnFlags) -> Result<Self> {
        self.attribute(AttrSpec::new(name, AttrType::DateTime, flags))
    }

    /// A JSON-object attribute.
    pub fn dict(self, name: impl Into<String>, flags: ColumnFlags) -> Result<Self> {
        self.attribute(AttrSpec::new(name, AttrType::Dict, flags))
    }

    /// A JSON-array attribute.
    pub fn list(self, name: impl Into<String>, flags: ColumnFlags) -> Result<Self> {
        self.attribute(AttrSpec::new(name, AttrType::List, flags))
    }

    /// A flag attribute over the given vocabulary.
    pub fn flag(
        self,
        name: impl Into<String>,
        flag_type: Arc<FlagType>,
        flags: ColumnFlags,
    ) -> Result<Self> {
        self.attribute(AttrSpec::flag(name, flag_type, flags))
    }

    /// A relation attribute referencing another registered type.
    pub fn relation(
        self,
        name: impl Into<String>,
        related: &Arc<BoMeta>,
        flags: ColumnFlags,
    ) -> Result<Self> {
        self.attribute(AttrSpec::relation(
            name,
            related.type_name().to_string(),
            related.table().to_string(),
            flags,
        ))
    }

    /// Finish the type and register it.
    pub fn build_into(self, registry: &SchemaRegistry) -> Arc<BoMeta> {
        let table = self
            .table
            .unwrap_or_else(|| format!("{}s", self.type_name));
        let meta = Arc::new(BoMeta {
            type_name: self.type_name,
            table,
            parent: self.parent,
            own_attrs: self.attrs,
        });
        registry.register(Arc::clone(&meta));
        meta
    }
}

/// Registry of all declared business-object types.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    types: Mutex<BTreeMap<String, Arc<BoMeta>>>,
}

impl SchemaRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type.
    pub fn register(&self, meta: Arc<BoMeta>) {
        tracing::debug!(bo_type = %meta.type_name(), table = %meta.table(), "registered business-object type");
        let mut types = self
            .types
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if types.insert(meta.type_name().to_string(), meta).is_some() {
            tracing::warn!("business-object type registered twice");
        }
    }

    /// Look up a registered type.
    pub fn get(&self, type_name: &str) -> Option<Arc<BoMeta>> {
        self.types
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(type_name)
            .cloned()
    }

    /// Look up a registered type; an unknown name is a validation error.
    pub fn lookup(&self, type_name: &str) -> Result<Arc<BoMeta>> {
        self.get(type_name).ok_or_else(|| {
            Error::validation(format!(
                "no type of business object with name '{type_name}' found"
            ))
        })
    }

    /// All registered types, in name order.
    pub fn all(&self) -> Vec<Arc<BoMeta>> {
        self.types
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

/// One business-object instance: an attribute map plus the raw snapshot of
/// the last-known database row, used to compute minimal update diffs.
#[derive(Debug, Clone)]
pub struct BusinessObject {
    meta: Arc<BoMeta>,
    data: BTreeMap<String, Value>,
    db_data: BTreeMap<String, Value>,
}

impl BusinessObject {
    /// A fresh, unsaved instance.
    pub fn new(meta: Arc<BoMeta>) -> Self {
        Self {
            meta,
            data: BTreeMap::new(),
            db_data: BTreeMap::new(),
        }
    }

    /// The type metadata.
    pub fn meta(&self) -> &Arc<BoMeta> {
        &self.meta
    }

    /// The identity, `None` until first insert.
    pub fn id(&self) -> Option<i64> {
        self.data.get(ID_ATTR).and_then(Value::as_int)
    }

    /// Read an attribute's stored value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// The current attribute map.
    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    /// The raw snapshot of the last-known database row.
    pub fn db_snapshot(&self) -> &BTreeMap<String, Value> {
        &self.db_data
    }

    /// Write an attribute after descriptor validation.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let attr = self
            .meta
            .attr(name)
            .ok_or_else(|| Error::validation(format!("unknown attribute '{name}'")))?;
        if attr.name == ID_ATTR {
            return match value {
                Value::Null => Ok(()),
                Value::Int(id) => self.set_id(id),
                other => Err(Error::validation(format!(
                    "'{other:?}' invalid to set attribute 'id'"
                ))),
            };
        }
        let checked = attr.check_value(value)?;
        self.data.insert(attr.name, checked);
        Ok(())
    }

    /// Write the identity.
    ///
    /// The id is immutable once assigned: a second non-null write fails.
    pub fn set_id(&mut self, id: i64) -> Result<()> {
        if self.id().is_some() {
            return Err(Error::validation("cannot set id of existing object"));
        }
        self.data.insert(ID_ATTR.to_string(), Value::Int(id));
        Ok(())
    }

    /// Write a flag attribute from its typed value.
    pub fn set_flag(&mut self, name: &str, flag: &FlagValue) -> Result<()> {
        self.set(name, Value::Text(flag.encode()))
    }

    /// Read a flag attribute as its decoded bitset view.
    pub fn get_flag(&self, name: &str) -> Result<Option<FlagValue>> {
        let attr = self
            .meta
            .attr(name)
            .ok_or_else(|| Error::validation(format!("unknown attribute '{name}'")))?;
        let Some(flag_type) = &attr.flag_type else {
            return Err(Error::validation(format!(
                "attribute '{name}' is not a flag attribute"
            )));
        };
        match self.data.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Text(text)) => Ok(Some(flag_type.decode(text)?)),
            Some(other) => Err(Error::validation(format!(
                "attribute '{name}' holds '{other:?}', not a flag encoding"
            ))),
        }
    }

    /// Write a relation attribute from the related instance.
    ///
    /// The instance must belong to the declared related type and must have
    /// been stored (its id is the stored foreign key).
    pub fn set_relation(&mut self, name: &str, related: &BusinessObject) -> Result<()> {
        let attr = self
            .meta
            .attr(name)
            .ok_or_else(|| Error::validation(format!("unknown attribute '{name}'")))?;
        let Some(expected) = &attr.relation_type else {
            return Err(Error::validation(format!(
                "attribute '{name}' is not a relation attribute"
            )));
        };
        if related.meta().type_name() != expected {
            return Err(Error::validation(format!(
                "relation '{name}' expects a '{expected}', got '{}'",
                related.meta().type_name()
            )));
        }
        let Some(id) = related.id() else {
            return Err(Error::validation(format!(
                "related '{expected}' must be stored before it can be referenced"
            )));
        };
        self.data.insert(attr.name, Value::Int(id));
        Ok(())
    }

    /// The attribute map as a JSON object (list-subscription payloads).
    pub fn attributes_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for (name, value) in &self.data {
            object.insert(name.clone(), value_to_json(value));
        }
        serde_json::Value::Object(object)
    }

    /// Load a fetched row: snapshot the raw values and convert every
    /// stored column to its semantic type.
    pub(crate) fn load_db_row(&mut self, row: Row) -> Result<()> {
        let (columns, values) = row.into_parts();
        let db_data: BTreeMap<String, Value> = columns.into_iter().zip(values).collect();
        for attr in self.meta.attribute_descriptions() {
            let converted = crate::convert::convert_from_db(db_data.get(&attr.name), &attr)?;
            self.data.insert(attr.name, converted);
        }
        self.db_data = db_data;
        Ok(())
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Value::from(*f),
        Value::Text(s) | Value::Date(s) | Value::Timestamp(s) => {
            serde_json::Value::String(s.clone())
        }
        Value::Json(j) => j.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_meta(registry: &SchemaRegistry) -> Arc<BoMeta> {
        BoMetaBuilder::new("account")
            .str("name", ColumnFlags::NOT_NULL)
            .unwrap()
            .int("balance", ColumnFlags::NONE)
            .unwrap()
            .build_into(registry)
    }

    #[test]
    fn test_base_attributes_are_prepended() {
        let registry = SchemaRegistry::new();
        let meta = account_meta(&registry);
        let names: Vec<String> = meta
            .attribute_descriptions()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["id", "last_updated", "name", "balance"]);
        assert_eq!(meta.primary_key().unwrap(), "id");
        assert_eq!(meta.table(), "accounts");
    }

    #[test]
    fn test_derived_type_walks_parent_chain() {
        let registry = SchemaRegistry::new();
        let parent = account_meta(&registry);
        let child = BoMetaBuilder::derive("savings_account", parent)
            .int("interest_bp", ColumnFlags::NONE)
            .unwrap()
            .build_into(&registry);
        let names: Vec<String> = child
            .attribute_descriptions()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(
            names,
            vec!["id", "last_updated", "name", "balance", "interest_bp"]
        );
    }

    #[test]
    fn test_duplicate_attribute_is_a_noop() {
        let registry = SchemaRegistry::new();
        let meta = BoMetaBuilder::new("account")
            .str("name", ColumnFlags::NOT_NULL)
            .unwrap()
            .str("name", ColumnFlags::NONE)
            .unwrap()
            .build_into(&registry);
        let descriptions = meta.attribute_descriptions();
        let names: Vec<&str> = descriptions.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names.iter().filter(|n| **n == "name").count(), 1);
        // The first registration wins.
        assert!(meta.attr("name").unwrap().not_null());
    }

    #[test]
    fn test_registry_lookup() {
        let registry = SchemaRegistry::new();
        let meta = account_meta(&registry);
        assert!(Arc::ptr_eq(&registry.lookup("account").unwrap(), &meta));
        assert_eq!(
            registry.lookup("nope").unwrap_err().kind(),
            "validation"
        );
        assert_eq!(registry.all().len(), 1);
    }

    #[test]
    fn test_set_validates_through_descriptor() {
        let registry = SchemaRegistry::new();
        let meta = account_meta(&registry);
        let mut bo = BusinessObject::new(meta);
        bo.set("name", Value::Text("checking".into())).unwrap();
        assert!(bo.set("name", Value::Null).is_err());
        assert!(bo.set("name", Value::Int(2)).is_err());
        assert!(bo.set("missing", Value::Int(2)).is_err());
    }

    #[test]
    fn test_id_is_write_once() {
        let registry = SchemaRegistry::new();
        let meta = account_meta(&registry);
        let mut bo = BusinessObject::new(meta);
        assert_eq!(bo.id(), None);
        bo.set_id(7).unwrap();
        assert_eq!(bo.id(), Some(7));
        let err = bo.set_id(8).unwrap_err();
        assert!(err.message().contains("cannot set id of existing object"));
        // Setting through the generic path is rejected the same way.
        assert!(bo.set("id", Value::Int(9)).is_err());
    }

    #[test]
    fn test_relation_write_checks_type_and_identity() {
        let registry = SchemaRegistry::new();
        let account = account_meta(&registry);
        let txn = BoMetaBuilder::new("txn")
            .relation("account", &account, ColumnFlags::NOT_NULL)
            .unwrap()
            .int("amount", ColumnFlags::NONE)
            .unwrap()
            .build_into(&registry);

        let mut unsaved = BusinessObject::new(Arc::clone(&account));
        unsaved.set("name", Value::Text("cash".into())).unwrap();

        let mut txn_bo = BusinessObject::new(txn);
        // Unsaved relation target is rejected.
        assert!(txn_bo.set_relation("account", &unsaved).is_err());

        let mut saved = unsaved.clone();
        saved.set_id(3).unwrap();
        txn_bo.set_relation("account", &saved).unwrap();
        assert_eq!(txn_bo.get("account"), Some(&Value::Int(3)));

        // A different type is rejected.
        let other = BusinessObject::new(Arc::clone(&account));
        assert!(txn_bo.set_relation("amount", &other).is_err());
    }

    #[test]
    fn test_attributes_json() {
        let registry = SchemaRegistry::new();
        let meta = account_meta(&registry);
        let mut bo = BusinessObject::new(meta);
        bo.set("name", Value::Text("checking".into())).unwrap();
        bo.set("balance", Value::Int(1250)).unwrap();
        let json = bo.attributes_json();
        assert_eq!(json["name"], serde_json::json!("checking"));
        assert_eq!(json["balance"], serde_json::json!(1250));
    }
}
