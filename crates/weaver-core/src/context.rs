//! Shared context threaded through one workflow run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Mapping from variable name to value, mutated by each task's folded result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedContext {
    vars: Map<String, Value>,
}

impl SharedContext {
    /// Create an empty context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Whether a variable is bound
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Bind a variable, replacing any previous value
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Merge every entry of `entries` into the context, key by key
    pub fn merge(&mut self, entries: Map<String, Value>) {
        for (key, value) in entries {
            self.vars.insert(key, value);
        }
    }

    /// Iterate over variable names
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// Number of bound variables
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether no variable is bound
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Render the context as a JSON object literal
    ///
    /// # Errors
    /// Returns an error if a value cannot be serialized
    pub fn to_json_literal(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.vars)
    }
}

impl From<Map<String, Value>> for SharedContext {
    fn from(vars: Map<String, Value>) -> Self {
        Self { vars }
    }
}

impl From<SharedContext> for Value {
    fn from(context: SharedContext) -> Self {
        Self::Object(context.vars)
    }
}

impl FromIterator<(String, Value)> for SharedContext {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_overwrites_existing_keys() {
        let mut context: SharedContext = [
            ("a".to_owned(), json!(1)),
            ("b".to_owned(), json!(2)),
        ]
        .into_iter()
        .collect();

        let Value::Object(update) = json!({"b": 20, "c": 30}) else {
            panic!("fixture is an object");
        };
        context.merge(update);

        assert_eq!(context.get("a"), Some(&json!(1)));
        assert_eq!(context.get("b"), Some(&json!(20)));
        assert_eq!(context.get("c"), Some(&json!(30)));
        assert_eq!(context.len(), 3);
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let mut context = SharedContext::new();
        context.insert("answer", json!(42));
        let literal = context.to_json_literal().unwrap();
        assert_eq!(literal, r#"{"answer":42}"#);
    }
}
