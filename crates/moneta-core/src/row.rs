//! Materialized result rows.

use crate::error::{Error, Result};
use crate::value::Value;

/// Conversion from a borrowed [`Value`] into a concrete Rust type.
pub trait FromValue: Sized {
    /// Convert, returning `None` when the variant does not fit.
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_float()
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

/// One result row: column names in query order plus their values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Build a row from parallel column/value vectors.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Column names in query order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in query order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Look up a value by column name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Value by position.
    pub fn get_index(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Typed lookup by column name.
    pub fn get_named<T: FromValue>(&self, column: &str) -> Result<T> {
        let value = self
            .get(column)
            .ok_or_else(|| Error::operational(format!("no column '{column}' in result row")))?;
        T::from_value(value)
            .ok_or_else(|| Error::operational(format!("column '{column}' has unexpected type")))
    }

    /// Typed lookup by position.
    pub fn get_as<T: FromValue>(&self, idx: usize) -> Result<T> {
        let value = self
            .get_index(idx)
            .ok_or_else(|| Error::operational(format!("no column #{idx} in result row")))?;
        T::from_value(value)
            .ok_or_else(|| Error::operational(format!("column #{idx} has unexpected type")))
    }

    /// Consume into the (columns, values) pair.
    pub fn into_parts(self) -> (Vec<String>, Vec<Value>) {
        (self.columns, self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::new(
            vec!["id".to_string(), "name".to_string()],
            vec![Value::Int(1), Value::Text("groceries".to_string())],
        )
    }

    #[test]
    fn test_get_by_name() {
        let row = sample();
        assert_eq!(row.get("id"), Some(&Value::Int(1)));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_get_named_typed() {
        let row = sample();
        assert_eq!(row.get_named::<i64>("id").unwrap(), 1);
        assert_eq!(row.get_named::<String>("name").unwrap(), "groceries");
        assert!(row.get_named::<i64>("name").is_err());
    }

    #[test]
    fn test_get_as_positional() {
        let row = sample();
        assert_eq!(row.get_as::<i64>(0).unwrap(), 1);
        assert!(row.get_as::<i64>(5).is_err());
    }
}
