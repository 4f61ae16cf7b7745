//! Collision-free parameter naming.
//!
//! Every statement owns one [`KeyManager`]. Nested clause builders render
//! against their own manager and contribute their bindings to the enclosing
//! statement through [`KeyManager::merge_params`], which rewrites `:key`
//! placeholders to the disambiguated final keys.

use moneta_core::params::{NAMED_PARAM_RE, SqlParams};
use moneta_core::value::Value;

/// Assigns collision-free parameter names and deduplicates equal
/// (key, value) bindings.
#[derive(Debug, Default)]
pub struct KeyManager {
    last_key: u64,
    /// Final key → bound value.
    params: SqlParams,
    /// Proposed key → final keys registered for it.
    aliases: SqlAliasIndex,
}

type SqlAliasIndex = std::collections::BTreeMap<String, Vec<String>>;

impl KeyManager {
    /// Fresh manager with no registered keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` under the proposed key, returning the final key.
    ///
    /// Registering the same proposed key with an equal value reuses the
    /// existing final key; a different value receives a suffix-counter
    /// disambiguated key. An empty proposed key defaults to `param`.
    pub fn register(&mut self, proposed: &str, value: &Value) -> String {
        let proposed = if proposed.is_empty() { "param" } else { proposed };

        if let Some(finals) = self.aliases.get(proposed) {
            for key in finals {
                if self.params.get(key) == Some(value) {
                    return key.clone();
                }
            }
        }

        let mut key = proposed.to_string();
        while self.params.contains_key(&key) {
            self.last_key += 1;
            key = format!("{proposed}{}", self.last_key);
        }

        self.params.insert(key.clone(), value.clone());
        self.aliases
            .entry(proposed.to_string())
            .or_default()
            .push(key.clone());
        key
    }

    /// Merge a rendered fragment into this manager.
    ///
    /// Every `:key` occurrence in `query` whose key is present in `values`
    /// is rewritten to the (possibly disambiguated) final key; the final
    /// bindings accumulate into this manager's parameter map. Tokens that
    /// are not keys of `values` pass through untouched.
    pub fn merge_params(&mut self, query: &str, values: &SqlParams) -> String {
        NAMED_PARAM_RE
            .replace_all(query, |caps: &regex::Captures<'_>| {
                let key = &caps[1];
                match values.get(key) {
                    Some(value) => format!(":{}", self.register(key, value)),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// The accumulated final-key → value bindings.
    pub fn params(&self) -> &SqlParams {
        &self.params
    }

    /// Consume the manager, yielding its bindings.
    pub fn into_params(self) -> SqlParams {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(key: &str, value: Value) -> SqlParams {
        std::iter::once((key.to_string(), value)).collect()
    }

    #[test]
    fn test_equal_value_reuses_key() {
        let mut km = KeyManager::new();
        let a = km.register("amount", &Value::Int(10));
        let b = km.register("amount", &Value::Int(10));
        assert_eq!(a, b);
        assert_eq!(km.params().len(), 1);
    }

    #[test]
    fn test_conflicting_value_gets_suffixed_key() {
        let mut km = KeyManager::new();
        let a = km.register("amount", &Value::Int(10));
        let b = km.register("amount", &Value::Int(20));
        assert_eq!(a, "amount");
        assert_ne!(a, b);
        assert!(b.starts_with("amount"));
        assert_eq!(km.params().get(&b), Some(&Value::Int(20)));
    }

    #[test]
    fn test_empty_proposed_key_defaults() {
        let mut km = KeyManager::new();
        let key = km.register("", &Value::Text("x".into()));
        assert!(key.starts_with("param"));
    }

    #[test]
    fn test_merge_rewrites_and_accumulates() {
        let mut km = KeyManager::new();
        km.register("name", &Value::Text("rent".into()));

        let merged = km.merge_params(
            "name = :name",
            &one("name", Value::Text("utilities".into())),
        );
        // The nested fragment's `name` conflicts with the existing binding.
        assert_ne!(merged, "name = :name");
        assert_eq!(km.params().len(), 2);
        assert_eq!(
            km.params().get("name"),
            Some(&Value::Text("rent".to_string()))
        );
    }

    #[test]
    fn test_merge_leaves_foreign_tokens_untouched() {
        let mut km = KeyManager::new();
        let merged = km.merge_params("WHERE ts < :cutoff", &one("other", Value::Int(1)));
        assert_eq!(merged, "WHERE ts < :cutoff");
        assert!(km.params().is_empty());
    }

    #[test]
    fn test_merge_dedups_equal_pairs() {
        let mut km = KeyManager::new();
        let first = km.merge_params(":v", &one("v", Value::Int(5)));
        let second = km.merge_params(":v", &one("v", Value::Int(5)));
        assert_eq!(first, second);
        assert_eq!(km.params().len(), 1);
    }
}
