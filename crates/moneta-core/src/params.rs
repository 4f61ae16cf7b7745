//! Named-parameter binding.
//!
//! Statements carry `:name` placeholders plus a name→value map. Drivers
//! convert to their native positional form immediately before execution via
//! [`bind_positional`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::value::Value;

/// Named parameters of one statement.
pub type SqlParams = BTreeMap<String, Value>;

/// Matches `:name` placeholders. A leading alphabetic/underscore character
/// keeps `::` casts and bare colons out of the match.
pub static NAMED_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("valid parameter regex"));

/// Rewrite `:name` placeholders to positional `?` markers and collect the
/// bound values in first-occurrence order.
///
/// With `json_text` set, structured values are serialized to compact JSON
/// text for engines without a native JSON binding. A placeholder without a
/// binding is an operational error.
pub fn bind_positional(
    query: &str,
    params: &SqlParams,
    json_text: bool,
) -> Result<(String, Vec<Value>)> {
    let mut ordered: Vec<Value> = Vec::with_capacity(params.len());
    let mut missing: Option<String> = None;

    let converted = NAMED_PARAM_RE.replace_all(query, |caps: &regex::Captures<'_>| {
        let key = &caps[1];
        match params.get(key) {
            Some(value) => {
                let bound = if json_text {
                    match value.json_text() {
                        Some(text) => Value::Text(text),
                        None => value.clone(),
                    }
                } else {
                    value.clone()
                };
                ordered.push(bound);
                "?".to_string()
            }
            None => {
                if missing.is_none() {
                    missing = Some(key.to_string());
                }
                caps[0].to_string()
            }
        }
    });

    if let Some(key) = missing {
        return Err(Error::operational(format!("missing parameter '{key}'")));
    }
    Ok((converted.into_owned(), ordered))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, Value)]) -> SqlParams {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_binds_in_occurrence_order() {
        let p = params(&[("a", Value::Int(1)), ("b", Value::Int(2))]);
        let (sql, values) =
            bind_positional("SELECT * FROM t WHERE x = :b AND y = :a", &p, false).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE x = ? AND y = ?");
        assert_eq!(values, vec![Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn test_repeated_placeholder_binds_twice() {
        let p = params(&[("v", Value::Int(9))]);
        let (sql, values) = bind_positional("SELECT :v + :v", &p, false).unwrap();
        assert_eq!(sql, "SELECT ? + ?");
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_missing_parameter_is_an_error() {
        let p = params(&[("a", Value::Int(1))]);
        let err = bind_positional("SELECT :a, :nope", &p, false).unwrap_err();
        assert_eq!(err.kind(), "operational");
        assert!(err.message().contains("nope"));
    }

    #[test]
    fn test_json_values_dump_to_text() {
        let p = params(&[("doc", Value::Json(serde_json::json!({"k": 1})))]);
        let (_, values) = bind_positional("INSERT INTO t VALUES (:doc)", &p, true).unwrap();
        assert_eq!(values, vec![Value::Text(r#"{"k":1}"#.to_string())]);
    }

    #[test]
    fn test_non_json_values_pass_through_with_json_text() {
        let p = params(&[("n", Value::Int(5))]);
        let (_, values) = bind_positional("SELECT :n", &p, true).unwrap();
        assert_eq!(values, vec![Value::Int(5)]);
    }
}
